use serde::Serialize;

use crate::api::QuizQuestionMessage;
use crate::config::Language;

/// The same content in both interaction languages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Localized<T> {
    pub en: T,
    pub bn: T,
}

impl<T> Localized<T> {
    pub fn get(&self, language: Language) -> &T {
        language.pick(&self.bn, &self.en)
    }
}

/// One loaded quiz question; never changes after loading
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub prompt: Localized<String>,
    pub options: Localized<Vec<String>>,
    pub correct_answer: Localized<String>,
}

impl Question {
    pub fn is_correct(&self, option: &str, language: Language) -> bool {
        option == self.correct_answer.get(language)
    }

    /// Text read aloud when the question comes up
    pub fn narration(&self, language: Language) -> String {
        let options = self.options.get(language).join(", ");
        if options.is_empty() {
            self.prompt.get(language).clone()
        } else {
            format!("{} {}", self.prompt.get(language), options)
        }
    }
}

impl From<QuizQuestionMessage> for Question {
    fn from(msg: QuizQuestionMessage) -> Self {
        Self {
            prompt: Localized {
                en: msg.question_en,
                bn: msg.question_bn,
            },
            options: Localized {
                en: msg.options_en,
                bn: msg.options_bn,
            },
            correct_answer: Localized {
                en: msg.correct_answer_en,
                bn: msg.correct_answer_bn,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Correct,
    Incorrect,
}

impl Feedback {
    /// Short spoken cue for this outcome
    pub fn cue(self, language: Language) -> &'static str {
        match self {
            Feedback::Correct => language.pick("সঠিক!", "Correct!"),
            Feedback::Incorrect => language.pick("ভুল!", "Oops!"),
        }
    }
}

/// Outcome of moving past an answered question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Now on this (zero-based) question
    Next(usize),
    Finished,
}

/// Progress through one run of a quiz
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuizRunState {
    pub questions: Vec<Question>,
    pub index: usize,
    pub score: u32,
    pub selected_option: Option<String>,
    pub feedback: Option<Feedback>,
    pub started: bool,
    pub finished: bool,
}

impl QuizRunState {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            started: !questions.is_empty(),
            questions,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<&Question> {
        if self.finished {
            return None;
        }
        self.questions.get(self.index)
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Whether an answer would be taken right now
    pub fn accepts_answer(&self) -> bool {
        self.started && !self.finished && self.selected_option.is_none()
    }

    /// Record and score an answer. `None` when the answer is ignored, so a
    /// question is scored at most once.
    pub fn answer(&mut self, option: &str, language: Language) -> Option<Feedback> {
        if !self.accepts_answer() {
            return None;
        }
        let question = self.questions.get(self.index)?;

        let feedback = if question.is_correct(option, language) {
            self.score += 1;
            Feedback::Correct
        } else {
            Feedback::Incorrect
        };

        self.selected_option = Some(option.to_string());
        self.feedback = Some(feedback);
        Some(feedback)
    }

    pub fn advance(&mut self) -> Advance {
        if self.index + 1 < self.questions.len() {
            self.index += 1;
            self.selected_option = None;
            self.feedback = None;
            Advance::Next(self.index)
        } else {
            self.finished = true;
            Advance::Finished
        }
    }

    /// Play again with the same questions
    pub fn restart(&mut self) {
        self.index = 0;
        self.score = 0;
        self.selected_option = None;
        self.feedback = None;
        self.finished = false;
        self.started = !self.questions.is_empty();
    }

    /// Text read aloud when the result is revealed
    pub fn result_narration(&self, language: Language) -> String {
        match language {
            Language::Bangla => format!(
                "তোমার স্কোর {} এর মধ্যে {}।",
                self.total(),
                self.score
            ),
            Language::English => format!(
                "You scored {} out of {}.",
                self.score,
                self.total()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(n: usize) -> Question {
        Question {
            prompt: Localized {
                en: format!("Question {}?", n),
                bn: format!("প্রশ্ন {}?", n),
            },
            options: Localized {
                en: vec!["A".into(), "B".into()],
                bn: vec!["ক".into(), "খ".into()],
            },
            correct_answer: Localized {
                en: "A".into(),
                bn: "ক".into(),
            },
        }
    }

    #[test]
    fn test_double_answer_scores_once() {
        let mut run = QuizRunState::new(vec![question(1), question(2)]);

        assert_eq!(run.answer("A", Language::English), Some(Feedback::Correct));
        assert_eq!(run.answer("A", Language::English), None);
        assert_eq!(run.score, 1);
    }

    #[test]
    fn test_answer_uses_language_of_session() {
        let mut run = QuizRunState::new(vec![question(1)]);
        assert_eq!(run.answer("A", Language::Bangla), Some(Feedback::Incorrect));

        let mut run = QuizRunState::new(vec![question(1)]);
        assert_eq!(run.answer("ক", Language::Bangla), Some(Feedback::Correct));
    }

    #[test]
    fn test_advance_resets_selection_then_finishes() {
        let mut run = QuizRunState::new(vec![question(1), question(2)]);
        run.answer("B", Language::English);

        assert_eq!(run.advance(), Advance::Next(1));
        assert!(run.selected_option.is_none());
        assert!(run.feedback.is_none());

        run.answer("A", Language::English);
        assert_eq!(run.advance(), Advance::Finished);
        assert!(run.finished);
        assert_eq!(run.index, 1);
        assert!(run.answer("A", Language::English).is_none());
    }

    #[test]
    fn test_restart_clears_progress() {
        let mut run = QuizRunState::new(vec![question(1)]);
        run.answer("A", Language::English);
        run.advance();

        run.restart();
        assert_eq!((run.index, run.score, run.finished), (0, 0, false));
        assert!(run.accepts_answer());
    }

    #[test]
    fn test_empty_quiz_never_starts() {
        let mut run = QuizRunState::new(Vec::new());
        assert!(!run.started);
        assert!(run.answer("A", Language::English).is_none());
    }
}
