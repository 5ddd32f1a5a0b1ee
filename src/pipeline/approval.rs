//! Approval gate.
//!
//! Every validated stage result is shown to an approver before it may be
//! committed. Rejection must come with a reason; the reason becomes a
//! corrective transcript turn and the whole result is discarded. There is
//! no override and no timeout — the gate blocks until a verdict arrives.
//!
//! The approver is usually a person at the console, but an LLM proxy
//! primed with a persona brief can stand in for unattended evaluation
//! runs, answering both the gate's verdicts and the extraction step's
//! clarifying questions.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::console::Prompter;
use crate::llm::{ChatClient, ChatMessage};
use crate::state::StageId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { reason: String },
}

/// Binary gate over a rendered stage summary.
pub trait Approver {
    fn review(&mut self, stage: StageId, summary: &str) -> io::Result<Verdict>;
}

/// Approver that talks through a [`Prompter`]: show the summary, ask
/// "Is this correct?", collect the reason on a no.
pub struct PrompterApprover<P: Prompter> {
    prompter: P,
}

impl<P: Prompter> PrompterApprover<P> {
    pub fn new(prompter: P) -> Self {
        Self { prompter }
    }
}

impl<P: Prompter> Approver for PrompterApprover<P> {
    fn review(&mut self, stage: StageId, summary: &str) -> io::Result<Verdict> {
        self.prompter
            .inform(&format!("Proposed {}:\n{summary}", stage.as_str()));

        if self.prompter.confirm("Is this correct?")? {
            Ok(Verdict::Accepted)
        } else {
            let reason = self.prompter.ask("Explain what is wrong")?;
            Ok(Verdict::Rejected { reason })
        }
    }
}

/// Scripted approver for tests: pops one verdict per review, accepts once
/// the script runs out, and records everything it was shown.
#[derive(Default)]
pub struct ScriptedApprover {
    verdicts: VecDeque<Verdict>,
    pub reviews: Vec<(StageId, String)>,
}

impl ScriptedApprover {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            verdicts: verdicts.into(),
            reviews: Vec::new(),
        }
    }

    pub fn rejecting(reasons: Vec<&str>) -> Self {
        Self::new(
            reasons
                .into_iter()
                .map(|r| Verdict::Rejected {
                    reason: r.to_string(),
                })
                .collect(),
        )
    }
}

impl Approver for ScriptedApprover {
    fn review(&mut self, stage: StageId, summary: &str) -> io::Result<Verdict> {
        self.reviews.push((stage, summary.to_string()));
        Ok(self.verdicts.pop_front().unwrap_or(Verdict::Accepted))
    }
}

/// LLM stand-in for the person at the console.
///
/// Primed with a persona brief (who the user is, what they know, how to
/// answer), it keeps its own conversation with its own model and answers
/// whatever the pipeline would have asked the keyboard. Clones share one
/// conversation so the approver half and the prompter half see the same
/// history.
#[derive(Clone)]
pub struct ProxyResponder {
    core: Rc<RefCell<ResponderCore>>,
}

struct ResponderCore {
    llm: Box<dyn ChatClient>,
    model: String,
    history: Vec<ChatMessage>,
    /// Informational text shown since the last question, delivered with
    /// the next one.
    pending: Vec<String>,
}

impl ProxyResponder {
    pub fn new(llm: Box<dyn ChatClient>, model: &str, brief: &str) -> Self {
        Self {
            core: Rc::new(RefCell::new(ResponderCore {
                llm,
                model: model.to_string(),
                history: vec![ChatMessage::system(brief.to_string())],
                pending: Vec::new(),
            })),
        }
    }
}

impl ResponderCore {
    fn answer(&mut self, question: &str) -> io::Result<String> {
        let mut content = String::new();
        for shown in self.pending.drain(..) {
            content.push_str(&shown);
            content.push('\n');
        }
        content.push_str(question);

        self.history.push(ChatMessage::user(content));
        let outcome = self
            .llm
            .chat(&self.model, &self.history, &[])
            .map_err(io::Error::other)?;
        let answer = outcome.content.trim().to_string();
        self.history.push(ChatMessage::assistant(answer.clone()));

        tracing::debug!(question, answer = %answer, "Proxy responder answered");
        Ok(answer)
    }
}

impl Prompter for ProxyResponder {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        self.core.borrow_mut().answer(question)
    }

    fn inform(&mut self, text: &str) {
        self.core.borrow_mut().pending.push(text.to_string());
    }
}
