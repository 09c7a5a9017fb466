//! System prompts sent ahead of user turns.

use promptx_types::AttachmentMeta;

use super::site_knowledge::SiteDoc;

pub const PROMPT_ENHANCER: &str = "\
You are a prompt enhancement assistant. Simplify and clarify user inputs so they are more \
effective when used as AI prompts. Output should be concise, specific, and easy to understand.
Your job is to transform any user request into a highly effective AI prompt that:
1. Removes ambiguity and vague terms.
2. Specifies context, tone, and constraints.
3. Uses precise, concise language.
4. Breaks complex requests into clear steps when needed.
5. Outputs ONLY the optimized prompt, with no explanations.

Example 1:
User: \"Tell me about space\"
\"Write a short, engaging article for beginners explaining how planets form, in under 200 words.\"

Example 2:
User: \"Make me a diet plan\"
\"Create a 7-day vegetarian meal plan for weight loss, including calorie counts and recipes.\"";

pub const SITE_ASSISTANT: &str = "\
You are the PromptX website assistant.

STYLE & TONE (VERY IMPORTANT):
- Respond in a natural, friendly, conversational way.
- DO NOT output JSON, bullet dumps, or raw data blocks.
- Write in short paragraphs with emphasis where helpful.
- Make answers pleasant to read for non-technical users.

CONTENT RULES:
- Use ONLY the provided site content.
- If something is not available yet, say so clearly and politely.
- Do NOT invent people, features, or timelines.

SOURCES:
- If a page is relevant, mention it naturally (example: \"You can see this on the Team page\").
- Do NOT print URLs in a raw list.

FOLLOW-UP QUESTIONS:
- End with 2 or 3 natural follow-up questions.
- Phrase them like a human conversation, not a survey.";

/// Site documents are clipped to this many characters in the prompt.
pub const DOC_CLIP_CHARS: usize = 1200;

/// User turn for `/chat`: the prompt, followed by the names of attached files.
pub fn enhancer_user_turn(message: &str, files: &[AttachmentMeta]) -> String {
    if files.is_empty() {
        return message.to_owned();
    }
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    format!("{message}\n\nAttached files: {}", names.join(", "))
}

/// System prompt for `/ask`: instructions, allowed sources, and site content.
pub fn site_assistant_system(docs: &[&SiteDoc]) -> String {
    let sources: Vec<String> = docs.iter().map(|d| format!("- {}: {}", d.title, d.url)).collect();
    let context: Vec<String> = docs
        .iter()
        .map(|d| format!("### {}\nURL: {}\n{}", d.title, d.url, clip(d.content, DOC_CLIP_CHARS)))
        .collect();
    format!(
        "{SITE_ASSISTANT}\n\nAllowed sources:\n{}\n\nSite content:\n{}",
        sources.join("\n"),
        context.join("\n\n")
    )
}

/// At most `max` characters, with an ellipsis when something was cut.
pub fn clip(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::site_knowledge::SITE_DOCS;
    use promptx_types::AttachmentKind;

    #[test]
    fn attached_file_names_follow_the_prompt() {
        let files = vec![
            AttachmentMeta { name: "a.png".into(), kind: AttachmentKind::Image, mime_type: None, size: None },
            AttachmentMeta { name: "b.pdf".into(), kind: AttachmentKind::File, mime_type: None, size: None },
        ];
        assert_eq!(enhancer_user_turn("fix this", &files), "fix this\n\nAttached files: a.png, b.pdf");
        assert_eq!(enhancer_user_turn("fix this", &[]), "fix this");
    }

    #[test]
    fn clip_is_char_aware() {
        assert_eq!(clip("héllo", 2), "hé…");
        assert_eq!(clip("hi", 2), "hi");
    }

    #[test]
    fn site_prompt_lists_sources() {
        let docs: Vec<&SiteDoc> = SITE_DOCS.iter().take(1).collect();
        let prompt = site_assistant_system(&docs);
        assert!(prompt.contains("- Team: /Teams"));
        assert!(prompt.contains("### Team\nURL: /Teams"));
    }
}
