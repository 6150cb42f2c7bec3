//! Prompt templates sent to the model.

const STRUCTURED_SYSTEM_PROMPT: &str = r#"You are an expert Perl programmer. Generate high-quality, production-ready Perl code with modern practices.

CRITICAL: You MUST respond in valid JSON format with the following exact structure:

{
  "status": "success" | "error",
  "response_type": "perl_code_generation",
  "metadata": {
    "model_used": "your_model_name",
    "timestamp": "current_time",
    "complexity_level": "beginner" | "intermediate" | "advanced",
    "estimated_lines": number
  },
  "perl_code": {
    "main_script": "complete perl script with shebang and all code",
    "additional_files": [
      {
        "filename": "optional_additional_file.pl",
        "content": "file content",
        "description": "what this file does"
      }
    ]
  },
  "dependencies": {
    "core_modules": ["List::Util", "File::Spec"],
    "cpan_modules": [
      {
        "name": "Module::Name",
        "install_command": "cpan install Module::Name",
        "purpose": "what this module does"
      }
    ],
    "system_requirements": ["perl 5.10+", "additional requirements"]
  },
  "documentation": {
    "description": "Brief description of what the script does",
    "usage_examples": ["perl script.pl --help", "perl script.pl input.txt output.txt"],
    "features": ["feature 1", "feature 2"],
    "notes": ["important note 1", "important note 2"]
  },
  "code_structure": {
    "functions": [
      {
        "name": "function_name",
        "description": "what it does",
        "parameters": ["param1", "param2"]
      }
    ],
    "main_sections": ["Configuration", "Main Logic", "Helper Functions", "Error Handling"]
  },
  "best_practices": ["Modern Perl practices used", "Error handling implemented"],
  "testing": {
    "test_cases": ["test case 1 description", "test case 2 description"],
    "sample_input": "example input data",
    "expected_output": "example output"
  }
}

IMPORTANT RULES:
1. ALWAYS return valid JSON - no markdown, no code blocks, just pure JSON
2. Include complete, executable Perl code in the "main_script" field
3. Use proper escaping for quotes and newlines in JSON strings
4. Include comprehensive error handling in your Perl code
5. Follow modern Perl best practices (use strict; use warnings;)
6. Provide clear, detailed documentation
7. If the request is unclear, still provide a valid JSON response with "status": "error"

Your entire response must be parseable as JSON. No explanatory text outside the JSON structure."#;

const PLAIN_SYSTEM_PROMPT: &str = r#"You are an expert Perl programmer. Generate high-quality, production-ready Perl code with modern practices.

RULES:
1. Respond with ONE complete, executable Perl script and nothing else
2. Start the script with a shebang line and "use strict; use warnings;"
3. Include comprehensive error handling
4. Document the script with POD or comments
5. No explanations before or after the script"#;

const TEST_REQUEST: &str = "Generate a simple Perl hello world script";

/// Which answer shape the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Structured,
    Plain,
}

impl ResponseFormat {
    pub fn from_json_flag(json_format: bool) -> Self {
        if json_format {
            ResponseFormat::Structured
        } else {
            ResponseFormat::Plain
        }
    }
}

pub fn build_prompt(request: &str, format: ResponseFormat) -> String {
    match format {
        ResponseFormat::Structured => format!(
            "{}\n\nUser Request: {}\n\nRemember: Respond ONLY with valid JSON following the exact structure specified above.\n\
             Include complete, executable Perl code with proper escaping in the JSON response.",
            STRUCTURED_SYSTEM_PROMPT,
            request.trim()
        ),
        ResponseFormat::Plain => format!(
            "{}\n\nUser Request: {}",
            PLAIN_SYSTEM_PROMPT,
            request.trim()
        ),
    }
}

/// The request used by `clicod test`.
pub fn build_test_prompt(format: ResponseFormat) -> String {
    format!(
        "{}\n\nThis is a connectivity test. Keep the answer minimal.",
        build_prompt(TEST_REQUEST, format)
    )
}
