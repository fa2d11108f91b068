use crate::{
    generation::{Prompt, PromptMessage, PromptPurpose},
    types::{ConversationTurn, Role},
};

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}

fn analysis_system_prompt(video_id: &str) -> String {
    format!(
        r#"You are an expert video content analyst. Analyze this YouTube video transcript and extract valuable insights.

  SUMMARIZE, DON'T TRANSCRIBE: extract insights, arguments, and conclusions, not word-for-word transcript.

  OUTPUT: Return ONLY valid JSON with this exact structure:
  {{
    "summary": {{
      "title": "Video title",
      "videoId": "{video_id}",
      "description": "Brief topic description",
      "thumbnailUrl": "{thumbnail}",
      "synopsis": "2-3 sentence summary"
    }},
    "sections": [
      {{
        "id": "section1",
        "title": "Section title",
        "content": [
          {{"text": "Key point (1-2 sentences)", "timestamp": "00:00:00"}}
        ]
      }}
    ]
  }}

  RULES:
  - Write "summary" before "sections"
  - Cover the ENTIRE video from beginning to end; "[...]" marks skipped transcript
  - Create sections based on natural topic changes, each with a unique id
  - Timestamps use "HH:MM:SS" and are copied EXACTLY from the transcript
  - Output ONLY JSON, no markdown code blocks"#,
        thumbnail = thumbnail_url(video_id),
    )
}

/// Builds the analysis prompt for an already-sampled transcript.
pub fn build_analysis_prompt(
    video_id: &str,
    title: Option<&str>,
    sampled_transcript: &str,
    temperature: f32,
) -> Prompt {
    let user_prompt = format!(
        "Video Title: {}\nVideo ID: {}\nThumbnail: {}\n\nTranscript:\n{}",
        title.unwrap_or("Unknown"),
        video_id,
        thumbnail_url(video_id),
        sampled_transcript
    );

    Prompt {
        purpose: PromptPurpose::Analysis,
        system: analysis_system_prompt(video_id),
        messages: vec![PromptMessage::user(user_prompt)],
        temperature,
    }
}

pub const CHAT_SYSTEM_PROMPT: &str = r#"You are PageOn-Video assistant, helping users understand video content.

Your abilities:
1. Deep Analysis: provide accurate responses based on the video transcript and chapters
2. Timestamps: mark precise timestamps in format [MM:SS] or [HH:MM:SS]
3. Contextual Understanding: comprehend the overall video structure

Response Format:
- Use [05:30] format to cite timestamps
- List all relevant timestamps if a topic appears multiple times
- Be concise yet informative
- Friendly and professional tone"#;

/// Builds a chat prompt: prior turns oldest-first, then the new question
/// wrapped with the video context.
pub fn build_chat_prompt(
    history: &[ConversationTurn],
    video_context: Option<&serde_json::Value>,
    message: &str,
    temperature: f32,
) -> Prompt {
    let mut messages: Vec<PromptMessage> = history
        .iter()
        .map(|turn| match turn.role {
            Role::User => PromptMessage::user(turn.text.as_str()),
            Role::Assistant => PromptMessage::assistant(turn.text.as_str()),
        })
        .collect();

    let context = video_context
        .filter(|value| !value.is_null())
        .map(|value| value.to_string())
        .unwrap_or_else(|| "No context".to_string());
    messages.push(PromptMessage::user(format!(
        "Video Context: {context}\n\nUser Question: {message}"
    )));

    Prompt {
        purpose: PromptPurpose::Chat,
        system: CHAT_SYSTEM_PROMPT.to_string(),
        messages,
        temperature,
    }
}

/// Display name for a target language code. Unknown codes map to English.
pub fn language_name(code: &str) -> &'static str {
    match code.trim().to_ascii_lowercase().as_str() {
        "zh" => "Chinese (简体中文)",
        "ja" => "Japanese (日本語)",
        "ko" => "Korean (한국어)",
        "es" => "Spanish (Español)",
        "fr" => "French (Français)",
        "de" => "German (Deutsch)",
        _ => "English",
    }
}

/// Builds a prompt that asks for `document_json` translated into
/// `language_code`, keeping ids, URLs and timestamps untouched.
pub fn build_translation_prompt(document_json: &str, language_code: &str, temperature: f32) -> Prompt {
    let system = format!(
        r#"You are a professional translator.
Translate the video content JSON to {language}.

RULES:
1. Translate ONLY text fields (title, description, synopsis, text)
2. DO NOT translate: videoId, thumbnailUrl, id, timestamp
3. Keep exact same JSON structure
4. Output valid JSON only"#,
        language = language_name(language_code),
    );

    Prompt {
        purpose: PromptPurpose::Translation,
        system,
        messages: vec![PromptMessage::user(document_json)],
        temperature,
    }
}
