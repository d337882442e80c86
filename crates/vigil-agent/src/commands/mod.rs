pub mod cipher;
pub mod run;
pub mod sample;

use std::io::{BufRead, Write};

use vigil_core::bootstrap::PasswordSource;
use vigil_core::config::AnswerSource;

/// Read one trimmed line from stdin, `None` on EOF or I/O failure.
pub fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Console prompts for first-run setup and password entry.
pub struct Console;

impl PasswordSource for Console {
    fn request_password(&mut self, attempt: u32, max_attempts: u32) -> Option<String> {
        read_line(&format!("Password ({attempt}/{max_attempts}): ")).filter(|p| !p.is_empty())
    }
}

impl AnswerSource for Console {
    fn machine_name(&mut self) -> Option<String> {
        read_line("Machine name: ").filter(|v| !v.is_empty())
    }

    fn company(&mut self) -> Option<String> {
        read_line("Company: ").filter(|v| !v.is_empty())
    }

    fn disk_paths(&mut self) -> Option<Vec<String>> {
        let raw = read_line("Disk paths to monitor (comma separated): ")?;
        let paths: Vec<String> = raw
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        (!paths.is_empty()).then_some(paths)
    }
}
