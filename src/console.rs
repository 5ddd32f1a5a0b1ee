//! Console question/answer boundary.
//!
//! Everything that talks to the person driving the run goes through
//! [`Prompter`], so tests (and the unattended evaluation responder) can
//! stand in for the keyboard.

use std::io::{self, BufRead, Write};

/// Free-text and yes/no interaction with whoever is driving the run.
pub trait Prompter {
    /// Pose a question, return the raw answer.
    fn ask(&mut self, question: &str) -> io::Result<String>;

    /// Show text without expecting an answer.
    fn inform(&mut self, text: &str);

    /// Yes/no question. Repeats until the answer is `y` or `n`.
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let answer = self.ask(&format!("{question} [y/n]"))?;
            match answer.trim() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                _ => continue,
            }
        }
    }
}

/// Interactive prompter on stdin/stdout.
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{question}: ")?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }

    fn inform(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Scripted prompter for tests: pops one answer per question, records
/// everything it was asked and shown.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    pub questions: Vec<String>,
    pub informed: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<&str>) -> Self {
        Self {
            answers: answers.into_iter().map(String::from).collect(),
            questions: Vec::new(),
            informed: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        self.questions.push(question.to_string());
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "scripted answers exhausted")
        })
    }

    fn inform(&mut self, text: &str) {
        self.informed.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_answers_pop_in_order() {
        let mut prompter = ScriptedPrompter::new(vec!["0.01", "wall"]);
        assert_eq!(prompter.ask("mass?").unwrap(), "0.01");
        assert_eq!(prompter.ask("source type?").unwrap(), "wall");
        assert_eq!(prompter.questions.len(), 2);
    }

    #[test]
    fn confirm_retries_until_y_or_n() {
        let mut prompter = ScriptedPrompter::new(vec!["maybe", "", "n"]);
        assert!(!prompter.confirm("Is this correct?").unwrap());
        assert_eq!(prompter.questions.len(), 3);
    }

    #[test]
    fn exhausted_script_is_an_error() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        assert!(prompter.ask("anything?").is_err());
    }
}
