//! Questions and where they come from.

use quizhub_protocol::payloads::PublicQuestion;

/// A question with its answer.
///
/// Deliberately not `Serialize`: the only way onto the wire is
/// [`Question::to_public`], which drops `correct_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_index,
        }
    }

    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct_index
    }

    /// The client-facing form, without the answer.
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            question_id: self.id.clone(),
            title: self.title.clone(),
            options: self.options.clone(),
        }
    }
}

/// Supplies the question set for each new match.
///
/// Called once per match, when the loop is built; the set is fixed for
/// that match from then on.
pub trait QuestionSource: Send + Sync + 'static {
    fn questions(&self) -> Vec<Question>;
}

/// A fixed question list.
#[derive(Debug, Clone)]
pub struct StaticQuestions {
    questions: Vec<Question>,
}

impl StaticQuestions {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }
}

impl Default for StaticQuestions {
    fn default() -> Self {
        Self::new(vec![
            Question::new(
                "q1",
                "Which language runs on the .NET CLR?",
                ["Java", "C#", "Python", "Go"],
                1,
            ),
            Question::new(
                "q2",
                "TCP is oriented to?",
                ["Message", "Connection", "Event", "Packet"],
                1,
            ),
        ])
    }
}

impl QuestionSource for StaticQuestions {
    fn questions(&self) -> Vec<Question> {
        self.questions.clone()
    }
}
