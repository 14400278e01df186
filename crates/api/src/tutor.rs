//! Chat-completion tutor used for empathetic feedback, follow-up questions
//! and case discussions.

use async_trait::async_trait;
use core::fmt::{self, Display};
use model::chat::{Message, Role};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The request never got a response.
    Request,
    /// The API answered with a non-success status code.
    Status(u16),
    /// The response body was not a chat completion.
    Malformed,
    /// The completion had no content.
    Empty,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("Chat completion request failed."),
            Self::Status(code) => write!(f, "Chat completion API responded with status {code}."),
            Self::Malformed => f.write_str("Malformed chat completion response."),
            Self::Empty => f.write_str("Chat completion has no content."),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        log::error!("chat completion transport error: {err}");
        Self::Request
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// System instructions and sampling settings for one kind of conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub temperature: f32,
    pub presence_penalty: f32,
}

const EMPATHY: &str = "You are a neurology teacher who understands how learners feel. \
From the context, work out whether the resident answered the question correctly and reply with exactly two sentences of empathy. \
If the answer was correct, build on the sense of achievement given what made the question hard. \
If it was wrong, acknowledge the difficulty the resident likely had with it.";

const FOLLOW_UP: &str = "You are a neurology teacher. Read the conversation so far and answer the follow-up question carefully. \
Only answer about the most recently solved question.";

const CASE: &str = "You are a neurologist and medical educator. Answer questions about the morning conference case the resident is reading, kindly and clearly.\n\n\
Current case:\n{context}\n\n\
When answering:\n\
1. Relate the explanation to the case.\n\
2. Include the clinical significance and the differential diagnosis.\n\
3. Suggest further work-up or treatment when appropriate.\n\
4. Be medically accurate.";

const MATERIAL: &str = "You are a neurologist specializing in clinical neurophysiology. Answer questions about the study material the resident is reading, kindly and clearly.\n\n\
Current material:\n{context}\n\n\
When answering:\n\
1. Relate the explanation to the material.\n\
2. Include the clinical significance.\n\
3. Point out further study topics when useful.";

impl Prompt {
    /// Two-sentence emotional response to a graded submission.
    pub fn empathy() -> Self {
        Self { system: EMPATHY.into(), temperature: 0.9, presence_penalty: 0.6 }
    }

    pub fn follow_up() -> Self {
        Self { system: FOLLOW_UP.into(), temperature: 0.3, presence_penalty: 0.9 }
    }

    /// Discussion of a morning-conference case.
    pub fn case(context: &str) -> Self {
        Self { system: CASE.replace("{context}", context), temperature: 0.3, presence_penalty: 0.9 }
    }

    /// Discussion of a study material.
    pub fn material(context: &str) -> Self {
        Self { system: MATERIAL.replace("{context}", context), temperature: 0.3, presence_penalty: 0.9 }
    }
}

#[async_trait]
pub trait Tutor: Send + Sync {
    /// Answers `input` given the system prompt and the prior conversation.
    async fn reply(&self, prompt: &Prompt, history: &[Message], input: &str) -> Result<String>;
}

/// Records a completed exchange in the conversation history.
pub fn append_exchange(history: &mut Vec<Message>, input: &str, reply: &str) {
    history.push(Message::human(input));
    history.push(Message::ai(reply));
}

/// Tutor backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletion {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletion {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    pub fn new(api_key: String, model: String, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(60)).build()?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self { http, endpoint, api_key, model })
    }

    fn body(&self, prompt: &Prompt, history: &[Message], input: &str) -> serde_json::Value {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(serde_json::json!({ "role": "system", "content": prompt.system }));
        messages.extend(history.iter().map(|message| {
            let role = match message.role {
                Role::Human => "user",
                Role::Ai => "assistant",
            };
            serde_json::json!({ "role": role, "content": message.content })
        }));
        messages.push(serde_json::json!({ "role": "user", "content": input }));

        serde_json::json!({
            "model": self.model,
            "temperature": prompt.temperature,
            "frequency_penalty": 0,
            "presence_penalty": prompt.presence_penalty,
            "messages": messages,
        })
    }
}

/// Extracts the first choice's content from a chat completion body.
fn parse_completion(bytes: &[u8]) -> Result<String> {
    #[derive(Deserialize)]
    struct Completion {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: Content,
    }

    #[derive(Deserialize)]
    struct Content {
        content: Option<String>,
    }

    let Completion { choices } = serde_json::from_slice(bytes).map_err(|_| Error::Malformed)?;
    choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_owned())
        .filter(|content| !content.is_empty())
        .ok_or(Error::Empty)
}

#[async_trait]
impl Tutor for ChatCompletion {
    async fn reply(&self, prompt: &Prompt, history: &[Message], input: &str) -> Result<String> {
        let body = self.body(prompt, history, input);
        let res = self.http.post(&self.endpoint).bearer_auth(&self.api_key).json(&body).send().await?;

        let status = res.status();
        if !status.is_success() {
            log::warn!("chat completion API responded with {status}");
            return Err(Error::Status(status.as_u16()));
        }

        let bytes = res.bytes().await?;
        parse_completion(&bytes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers every input with a fixed echo and remembers what it was asked.
    #[derive(Default)]
    pub(crate) struct Echo {
        pub(crate) asked: Mutex<Vec<(Prompt, usize, String)>>,
    }

    #[async_trait]
    impl Tutor for Echo {
        async fn reply(&self, prompt: &Prompt, history: &[Message], input: &str) -> Result<String> {
            self.asked.lock().unwrap().push((prompt.clone(), history.len(), input.to_owned()));
            Ok(format!("echo: {input}"))
        }
    }

    pub(crate) struct Offline;

    #[async_trait]
    impl Tutor for Offline {
        async fn reply(&self, _: &Prompt, _: &[Message], _: &str) -> Result<String> {
            Err(Error::Request)
        }
    }

    #[test]
    fn prompts_carry_their_settings() {
        assert_eq!(Prompt::empathy().temperature, 0.9);
        assert_eq!(Prompt::follow_up().temperature, 0.3);

        let case = Prompt::case("72M with sudden aphasia");
        assert!(case.system.contains("Current case:\n72M with sudden aphasia\n"));
        assert!(!case.system.contains("{context}"));
        assert!(Prompt::material("Test: EEG").system.contains("Current material:\nTest: EEG\n"));
    }

    #[test]
    fn request_body_maps_history_roles() {
        let client = ChatCompletion::new("key".into(), "gpt-4o".into(), "https://api.example.com/v1/").unwrap();
        assert_eq!(client.endpoint, "https://api.example.com/v1/chat/completions");

        let history = [Message::human("Why MCA?"), Message::ai("Because of the aphasia.")];
        let body = client.body(&Prompt::follow_up(), &history, "And the PCA?");
        let messages = body["messages"].as_array().unwrap();
        let roles: Vec<_> = messages.iter().map(|message| message["role"].as_str().unwrap()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[3]["content"], "And the PCA?");
        assert_eq!(body["model"], "gpt-4o");
    }

    #[test]
    fn parses_first_choice() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"  Well done.  "}},{"message":{"content":"ignored"}}]}"#;
        assert_eq!(parse_completion(body), Ok(String::from("Well done.")));
    }

    #[test]
    fn rejects_empty_or_malformed_completions() {
        assert_eq!(parse_completion(br#"{"choices":[]}"#), Err(Error::Empty));
        assert_eq!(parse_completion(br#"{"choices":[{"message":{"content":null}}]}"#), Err(Error::Empty));
        assert_eq!(parse_completion(b"<html>"), Err(Error::Malformed));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn history_grows_by_one_exchange() {
        let tutor = Echo::default();
        let mut history = Vec::new();
        let reply = tutor.reply(&Prompt::follow_up(), &history, "What about the PCA?").await.unwrap();
        append_exchange(&mut history, "What about the PCA?", &reply);
        assert_eq!(history, [Message::human("What about the PCA?"), Message::ai("echo: What about the PCA?")]);
        assert_eq!(tutor.asked.lock().unwrap()[0].1, 0);
        assert_eq!(Offline.reply(&Prompt::empathy(), &history, "hi").await, Err(Error::Request));
    }
}
