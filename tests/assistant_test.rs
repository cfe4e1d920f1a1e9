use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use gym_coach_lib::assistant::{
    chat_prompt, extract_reply, feedback_prompt, AssistantError, GeminiClient, GenerationRequest,
    CHAT_GREETING, COACH_BUSY_MESSAGE, CONNECTION_ERROR_MESSAGE, MISSING_KEY_MESSAGE,
};
use gym_coach_lib::{AppService, Assistant, ChatMessage, ChatRole, Config, LogEntry, Profile, TextGenerator};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Behaviour {
    Reply,
    Empty,
    Parse,
    Status,
}

/// Records every request and answers according to `behaviour`.
struct FakeGenerator {
    behaviour: Behaviour,
    delay: Option<Duration>,
    seen: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl FakeGenerator {
    fn boxed(behaviour: Behaviour) -> (Box<dyn TextGenerator>, Arc<Mutex<Vec<GenerationRequest>>>) {
        Self::boxed_with_delay(behaviour, None)
    }

    fn boxed_with_delay(
        behaviour: Behaviour,
        delay: Option<Duration>,
    ) -> (Box<dyn TextGenerator>, Arc<Mutex<Vec<GenerationRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let generator = Self {
            behaviour,
            delay,
            seen: Arc::clone(&seen),
        };
        (Box::new(generator), seen)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AssistantError> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behaviour {
            Behaviour::Reply => Ok("Keep the shoulder blades back.".to_string()),
            Behaviour::Empty => Err(AssistantError::EmptyResponse),
            Behaviour::Parse => Err(AssistantError::Parse(
                serde_json::from_str::<serde_json::Value>("x").unwrap_err(),
            )),
            Behaviour::Status => Err(AssistantError::Status {
                status: 429,
                body: "quota".to_string(),
            }),
        }
    }
}

fn logs(names: &[(&str, &str)]) -> Vec<LogEntry> {
    names
        .iter()
        .enumerate()
        .map(|(i, (name, weight))| LogEntry {
            exercise_name: name.to_string(),
            weight: weight.to_string(),
            timestamp: format!("2026-10-01T10:{i:02}:00.000Z"),
        })
        .collect()
}

#[tokio::test]
async fn test_missing_key_gives_fixed_message() {
    let assistant = Assistant::new(None);
    assert!(!assistant.is_configured());

    let review = assistant
        .generate_coach_feedback(&[], &Profile::default())
        .await;
    assert_eq!(review.as_deref(), Some(MISSING_KEY_MESSAGE));

    let reply = assistant
        .send_chat_message(&[], "How do I fix my posture?", &Profile::default())
        .await;
    assert_eq!(reply.as_deref(), Some(MISSING_KEY_MESSAGE));
}

#[tokio::test]
async fn test_failures_map_to_user_messages() {
    let cases = [
        (Behaviour::Reply, "Keep the shoulder blades back."),
        (Behaviour::Empty, COACH_BUSY_MESSAGE),
        (Behaviour::Status, COACH_BUSY_MESSAGE),
        (Behaviour::Parse, CONNECTION_ERROR_MESSAGE),
    ];
    for (behaviour, expected) in cases {
        let (generator, _) = FakeGenerator::boxed(behaviour);
        let assistant = Assistant::new(Some(generator));
        let review = assistant
            .generate_coach_feedback(&[], &Profile::default())
            .await;
        assert_eq!(review.as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn test_feedback_request_carries_recent_history() {
    let (generator, seen) = FakeGenerator::boxed(Behaviour::Reply);
    let assistant = Assistant::new(Some(generator));
    let history = logs(&[("Lat Pulldown", "40"), ("Treadmill", "N/A")]);

    assistant
        .generate_coach_feedback(&history, &Profile::default())
        .await;

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let turns = &requests[0].turns;
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, ChatRole::User);
    assert!(turns[0].text.contains("Lat Pulldown(40kg), Treadmill"));
    assert!(turns[0].text.contains("32-year-old engineer"));
    assert!(!requests[0].persona.is_empty());
}

#[test]
fn test_feedback_prompt_uses_last_ten_entries() {
    let history: Vec<(&str, &str)> = (0..12)
        .map(|i| if i < 2 { ("Pec Deck Fly", "30") } else { ("Treadmill", "N/A") })
        .collect();
    let prompt = feedback_prompt(&logs(&history), &Profile::default());
    assert!(!prompt.contains("Pec Deck Fly"));
    assert_eq!(prompt.matches("Treadmill").count(), 10);

    let prompt = feedback_prompt(&[], &Profile::default());
    assert!(prompt.contains("no records yet"));
}

#[test]
fn test_chat_prompt_mentions_question_and_profile() {
    let profile = Profile {
        age_years: 40,
        occupation: "Designer".to_string(),
        ..Profile::default()
    };
    let prompt = chat_prompt("Is rowing good for me?", &profile);
    assert!(prompt.contains("Is rowing good for me?"));
    assert!(prompt.contains("40-year-old designer"));
}

#[tokio::test]
async fn test_blank_chat_message_is_ignored() {
    let (generator, seen) = FakeGenerator::boxed(Behaviour::Reply);
    let assistant = Assistant::new(Some(generator));

    let reply = assistant
        .send_chat_message(&[], "   ", &Profile::default())
        .await;
    assert!(reply.is_none());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_busy_slot_rejects_second_request() {
    let (generator, seen) = FakeGenerator::boxed(Behaviour::Reply);
    let assistant = Assistant::new(Some(generator));

    let guard = assistant.feedback_slot().try_acquire();
    assert!(guard.is_some());
    assert!(assistant.feedback_slot().is_busy());
    let review = assistant
        .generate_coach_feedback(&[], &Profile::default())
        .await;
    assert!(review.is_none());

    // The chat slot is independent of the review slot.
    let reply = assistant
        .send_chat_message(&[], "Hello", &Profile::default())
        .await;
    assert!(reply.is_some());

    drop(guard);
    assert!(!assistant.feedback_slot().is_busy());
    let review = assistant
        .generate_coach_feedback(&[], &Profile::default())
        .await;
    assert!(review.is_some());
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_only_one_goes_out() {
    let (generator, seen) =
        FakeGenerator::boxed_with_delay(Behaviour::Reply, Some(Duration::from_millis(50)));
    let assistant = Assistant::new(Some(generator));
    let profile = Profile::default();

    let (first, second) = tokio::join!(
        assistant.send_chat_message(&[], "First", &profile),
        assistant.send_chat_message(&[], "Second", &profile),
    );
    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(!assistant.chat_slot().is_busy());
}

#[tokio::test]
async fn test_service_chat_keeps_transcript() -> Result<()> {
    let (generator, seen) = FakeGenerator::boxed(Behaviour::Reply);
    let conn = rusqlite::Connection::open_in_memory()?;
    let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
    let mut service =
        AppService::with_parts(Config::default(), conn, today, Assistant::new(Some(generator)))?;

    assert_eq!(service.chat_transcript(), [ChatMessage::model(CHAT_GREETING)]);
    assert!(service.send_chat_message("").await.is_none());
    assert_eq!(service.chat_transcript().len(), 1);

    let reply = service.send_chat_message(" Does rowing help? ").await;
    assert_eq!(reply.as_deref(), Some("Keep the shoulder blades back."));
    let transcript = service.chat_transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1], ChatMessage::user("Does rowing help?"));
    assert_eq!(transcript[2].role, ChatRole::Model);

    service.send_chat_message("And lateral raises?").await;
    {
        let requests = seen.lock().unwrap();
        // Greeting, first exchange, then the new question.
        assert_eq!(requests[1].turns.len(), 4);
        assert!(requests[1].turns[3].text.contains("And lateral raises?"));
    }

    let review = service.generate_coach_feedback().await;
    assert_eq!(review.as_deref(), service.coach_note());
    Ok(())
}

#[test]
fn test_extract_reply() {
    let body = r#"{"candidates":[{"content":{"parts":[{"text":"Row more."}],"role":"model"}}]}"#;
    assert_eq!(extract_reply(body).unwrap(), "Row more.");

    for body in [
        r#"{}"#,
        r#"{"candidates":[]}"#,
        r#"{"candidates":[{"content":{"parts":[]}}]}"#,
        r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#,
        r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
    ] {
        assert!(
            matches!(extract_reply(body), Err(AssistantError::EmptyResponse)),
            "body {body} should be empty"
        );
    }

    assert!(matches!(
        extract_reply("<html>oops</html>"),
        Err(AssistantError::Parse(_))
    ));
}

#[test]
fn test_request_body_shape() {
    let request = GenerationRequest {
        persona: "Be a coach.".to_string(),
        turns: vec![
            ChatMessage::model(CHAT_GREETING),
            ChatMessage::user("Hi"),
            ChatMessage::model("Hello!"),
            ChatMessage::user("Plan?"),
        ],
    };
    let body = GeminiClient::request_json(&request);

    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be a coach.");
    assert!(body["systemInstruction"].get("role").is_none());

    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "Hi");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["parts"][0]["text"], "Plan?");
}
