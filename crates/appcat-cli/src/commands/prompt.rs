//! Terminal prompt for package conflicts

use appcat_package::Prompter;
use inquire::error::InquireError;
use inquire::Select;
use std::io;

const CHOICES: [(&str, &str); 5] = [
    ("s", "skip this package"),
    ("u", "update this package"),
    ("a", "abort the import"),
    ("S", "skip all remaining conflicts"),
    ("U", "update all remaining conflicts"),
];

/// Asks on the terminal; fails when stdin is not a terminal
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn choose(&mut self, message: &str) -> io::Result<String> {
        let options: Vec<String> = CHOICES
            .iter()
            .map(|(key, label)| format!("{}  {}", key, label))
            .collect();

        let picked = Select::new(message, options).prompt().map_err(|e| match e {
            InquireError::NotTTY => {
                io::Error::other("cannot prompt without a terminal; pass --exists-action")
            }
            InquireError::IO(e) => e,
            e @ (InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                io::Error::new(io::ErrorKind::Interrupted, e.to_string())
            }
            other => io::Error::other(other.to_string()),
        })?;

        Ok(picked.split_whitespace().next().unwrap_or_default().to_string())
    }
}
