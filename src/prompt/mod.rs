// src/prompt/mod.rs
// Story-string rendering: logic-less template compilation over persona
// fields, then the macro pipeline, then whitespace post-processing.

use std::collections::HashMap;

use regex::Regex;
use tracing::error;

use crate::config::{CharacterCardData, ContextTemplate, InstructTemplate, SystemPrompt};
use crate::error::PromptError;
use crate::macros::{evaluate_macros, EvaluateOptions, MacroEnv, MacroValue, PromptContext};
use crate::storage::ConfigSource;

/// Persona fields fed into the story string. `extra` carries any further
/// caller-defined placeholders.
#[derive(Debug, Clone, Default)]
pub struct StoryStringParams {
    pub description: String,
    pub personality: String,
    pub persona: String,
    pub scenario: String,
    pub system: String,
    pub char: String,
    pub user: String,
    pub wi_before: String,
    pub wi_after: String,
    pub mes_examples: String,
    pub extra: HashMap<String, String>,
}

impl StoryStringParams {
    /// Every field under its template placeholder name.
    fn fields(&self) -> Vec<(&str, &str)> {
        let mut fields = vec![
            ("description", self.description.as_str()),
            ("personality", self.personality.as_str()),
            ("persona", self.persona.as_str()),
            ("scenario", self.scenario.as_str()),
            ("system", self.system.as_str()),
            ("char", self.char.as_str()),
            ("user", self.user.as_str()),
            ("wiBefore", self.wi_before.as_str()),
            ("wiAfter", self.wi_after.as_str()),
            ("mesExamples", self.mes_examples.as_str()),
        ];
        for (key, value) in &self.extra {
            fields.push((key.as_str(), value.as_str()));
        }
        fields
    }
}

/// Inputs for one render. The story string may come directly or from the
/// context template; a direct one wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub story_string: Option<&'a str>,
    pub instruct: Option<&'a InstructTemplate>,
    pub context: Option<&'a ContextTemplate>,
    pub system_prompt: Option<&'a SystemPrompt>,
}

/// Builds persona params from a character card, with the chatting user's
/// display name filled in.
pub fn story_params_from_card(card: &CharacterCardData, user_name: &str) -> StoryStringParams {
    StoryStringParams {
        description: card.description.clone(),
        personality: card.personality.clone(),
        scenario: card.scenario.clone(),
        system: card.system_prompt.clone(),
        char: card.name.clone(),
        user: user_name.to_string(),
        mes_examples: card.mes_example.clone(),
        ..Default::default()
    }
}

/// Renders the story string into the plain-text system context. Never
/// fails toward the caller: any internal error is logged and yields `""`.
pub fn render_story_string(
    params: &StoryStringParams,
    options: &RenderOptions<'_>,
    ctx: &mut PromptContext,
) -> String {
    let source = options
        .story_string
        .or_else(|| options.context.map(|c| c.story_string.as_str()))
        .unwrap_or("");
    if source.is_empty() {
        return String::new();
    }

    match try_render(source, params, options, ctx) {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "failed to render story string");
            String::new()
        }
    }
}

fn try_render(
    source: &str,
    params: &StoryStringParams,
    options: &RenderOptions<'_>,
    ctx: &mut PromptContext,
) -> Result<String, PromptError> {
    let compiled = interpolate(source, params)?;

    let mut env = MacroEnv::new();
    for (key, value) in params.fields() {
        env.entry(key.to_string())
            .or_insert_with(|| MacroValue::text(value));
    }

    let eval_options = EvaluateOptions {
        instruct: options.instruct,
        context: options.context,
        system_prompt: options.system_prompt,
        messages: &[],
    };
    let mut output = evaluate_macros(&compiled, &env, ctx, &eval_options);

    output = output.trim_start_matches('\n').to_string();
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}

/// Substitutes known placeholders; unknown ones are re-emitted in the
/// normalized `{{name}}` form so the macro pipeline (or nothing) can pick
/// them up later regardless of how the template spaced them.
fn interpolate(source: &str, params: &StoryStringParams) -> Result<String, PromptError> {
    let placeholder = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}")
        .map_err(|e| PromptError::Render(e.to_string()))?;
    let known: HashMap<&str, &str> = params.fields().into_iter().collect();

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for caps in placeholder.captures_iter(source) {
        let Some(matched) = caps.get(0) else { continue };
        out.push_str(&source[last..matched.start()]);
        match known.get(&caps[1]) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(&caps[1]);
                out.push_str("}}");
            }
        }
        last = matched.end();
    }
    out.push_str(&source[last..]);
    Ok(out)
}

/// Renders using whatever templates and character the storage layer has
/// marked active.
pub fn render_active_story_string(
    source: &dyn ConfigSource,
    ctx: &mut PromptContext,
    user_name: &str,
) -> String {
    let card = source.active_character();
    let context = source.active_context();
    let instruct = source.active_instruct();
    let system_prompt = source.active_system_prompt();

    let params = card
        .map(|c| story_params_from_card(&c.data, user_name))
        .unwrap_or_default();
    let options = RenderOptions {
        story_string: None,
        instruct: instruct.as_ref(),
        context: context.as_ref(),
        system_prompt: system_prompt.as_ref(),
    };
    render_story_string(&params, &options, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StoryStringParams {
        StoryStringParams {
            description: "A wandering bard.".to_string(),
            personality: "cheerful".to_string(),
            scenario: "a tavern at dusk".to_string(),
            char: "Elric".to_string(),
            user: "Traveler".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_story_string_renders_empty() {
        let mut ctx = PromptContext::new();
        let options = RenderOptions {
            story_string: Some(""),
            ..Default::default()
        };
        assert_eq!(render_story_string(&params(), &options, &mut ctx), "");
        assert_eq!(
            render_story_string(&params(), &RenderOptions::default(), &mut ctx),
            ""
        );
    }

    #[test]
    fn persona_fields_interpolate() {
        let mut ctx = PromptContext::new();
        let options = RenderOptions {
            story_string: Some("{{char}}: {{description}} Mood: {{personality}}"),
            ..Default::default()
        };
        let out = render_story_string(&params(), &options, &mut ctx);
        assert_eq!(out, "Elric: A wandering bard. Mood: cheerful\n");
    }

    #[test]
    fn unknown_placeholders_survive_both_stages() {
        let mut ctx = PromptContext::new();
        let options = RenderOptions {
            story_string: Some("{{char}} meets {{unknownThing}}"),
            ..Default::default()
        };
        let out = render_story_string(&params(), &options, &mut ctx);
        assert_eq!(out, "Elric meets {{unknownThing}}\n");
    }

    #[test]
    fn spaced_placeholders_are_normalized_for_the_pipeline() {
        let mut ctx = PromptContext::new();
        ctx.registry.register("mood", "wistful", None).unwrap();
        let options = RenderOptions {
            story_string: Some("{{char}} feels {{ mood }}"),
            ..Default::default()
        };
        let out = render_story_string(&params(), &options, &mut ctx);
        assert_eq!(out, "Elric feels wistful\n");

        // still unresolved names come out without the stray spaces
        let options = RenderOptions {
            story_string: Some("{{ unknownThing }}"),
            ..Default::default()
        };
        let out = render_story_string(&params(), &options, &mut ctx);
        assert_eq!(out, "{{unknownThing}}\n");
    }

    #[test]
    fn leading_blank_lines_are_stripped_and_newline_appended() {
        let mut ctx = PromptContext::new();
        let options = RenderOptions {
            story_string: Some("\n\n{{char}}"),
            ..Default::default()
        };
        assert_eq!(render_story_string(&params(), &options, &mut ctx), "Elric\n");
    }

    #[test]
    fn existing_trailing_newline_is_not_doubled() {
        let mut ctx = PromptContext::new();
        let options = RenderOptions {
            story_string: Some("{{char}}\n"),
            ..Default::default()
        };
        assert_eq!(render_story_string(&params(), &options, &mut ctx), "Elric\n");
    }

    #[test]
    fn story_string_from_context_template() {
        let mut ctx = PromptContext::new();
        let context = ContextTemplate {
            story_string: "{{system}}{{description}}".to_string(),
            ..Default::default()
        };
        let mut p = params();
        p.system = "sys. ".to_string();
        let options = RenderOptions {
            context: Some(&context),
            ..Default::default()
        };
        let out = render_story_string(&p, &options, &mut ctx);
        assert_eq!(out, "sys. A wandering bard.\n");
    }

    #[test]
    fn macros_run_after_interpolation() {
        let mut ctx = PromptContext::new();
        let options = RenderOptions {
            story_string: Some("{{setvar::seen::yes}}{{char}}/{{getvar::seen}}"),
            ..Default::default()
        };
        let out = render_story_string(&params(), &options, &mut ctx);
        assert_eq!(out, "Elric/yes\n");
    }

    #[test]
    fn extra_params_are_available() {
        let mut ctx = PromptContext::new();
        let mut p = params();
        p.extra.insert("mood".to_string(), "wistful".to_string());
        let options = RenderOptions {
            story_string: Some("{{char}} feels {{mood}}"),
            ..Default::default()
        };
        let out = render_story_string(&p, &options, &mut ctx);
        assert_eq!(out, "Elric feels wistful\n");
    }

    #[test]
    fn rendering_is_a_pure_function_of_its_inputs() {
        let mut ctx = PromptContext::new();
        let options = RenderOptions {
            story_string: Some("{{char}} in {{scenario}}: {{description}}"),
            ..Default::default()
        };
        let first = render_story_string(&params(), &options, &mut ctx);
        let second = render_story_string(&params(), &options, &mut ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn card_params_map_the_persona_fields() {
        let card = CharacterCardData {
            name: "Mira".to_string(),
            description: "desc".to_string(),
            personality: "calm".to_string(),
            scenario: "library".to_string(),
            system_prompt: "be calm".to_string(),
            mes_example: "<START>".to_string(),
            ..Default::default()
        };
        let p = story_params_from_card(&card, "Reader");
        assert_eq!(p.char, "Mira");
        assert_eq!(p.user, "Reader");
        assert_eq!(p.system, "be calm");
        assert_eq!(p.mes_examples, "<START>");
    }
}
