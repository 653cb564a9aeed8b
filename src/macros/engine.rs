// src/macros/engine.rs
// Ordered, regex-driven macro evaluation pipeline.
//
// Rules run in three fixed groups: pre-environment (dice roll, instruct
// aliases, variable macros, newline/trim/noop), environment (registry and
// caller-supplied values), post-environment (history macros, reverse,
// comments, date/time, idle duration, random pick). Groups never
// interleave, output of one rule is never re-scanned by another, and a
// rule that fails only skips its own substitution.

use std::cell::RefCell;

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use regex::{Captures, Regex};
use tracing::warn;
use uuid::Uuid;

use super::{MacroEnv, MacroValue, PromptContext, Scope, VariableStore};
use crate::config::{ContextTemplate, InstructTemplate, SystemPrompt};
use crate::error::PromptError;

/// One chat turn as the history macros see it. System-role turns are
/// invisible to them.
#[derive(Debug, Clone, Default)]
pub struct HistoryMessage {
    pub content: String,
    pub is_user: bool,
    pub is_system: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            ..Default::default()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_system: true,
            ..Default::default()
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Caller-supplied context for one evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions<'a> {
    pub instruct: Option<&'a InstructTemplate>,
    pub context: Option<&'a ContextTemplate>,
    pub system_prompt: Option<&'a SystemPrompt>,
    pub messages: &'a [HistoryMessage],
}

type Replacer<'a> = Box<dyn Fn(&Captures) -> Result<String, PromptError> + 'a>;

struct MacroRule<'a> {
    pattern: Regex,
    replace: Replacer<'a>,
}

fn rule<'a>(
    pattern: &str,
    replace: impl Fn(&Captures) -> Result<String, PromptError> + 'a,
) -> Option<MacroRule<'a>> {
    match Regex::new(pattern) {
        Ok(compiled) => Some(MacroRule {
            pattern: compiled,
            replace: Box::new(replace),
        }),
        Err(e) => {
            warn!(pattern, error = %e, "skipping macro rule with invalid pattern");
            None
        }
    }
}

/// Rewrites `content` through the full macro pipeline. The registry and
/// variable store come from `ctx`; `env` carries the per-call values
/// (persona fields and anything else the caller overlays).
pub fn evaluate_macros(
    content: &str,
    env: &MacroEnv,
    ctx: &mut PromptContext,
    options: &EvaluateOptions<'_>,
) -> String {
    if content.is_empty() {
        return String::new();
    }

    // One nonce and one instant per invocation, shared by every rule that
    // wants them, so repeated macros stay mutually consistent.
    let nonce = Uuid::new_v4().to_string();
    let now = Local::now();

    let mut merged = env.clone();
    ctx.registry.populate(&mut merged);

    // The variable rules need shared mutable access while the rule list is
    // borrowed; the store moves into a cell for the duration of the pass.
    let vars = RefCell::new(std::mem::take(&mut ctx.variables));
    let messages = options.messages;

    let mut rules: Vec<MacroRule<'_>> = Vec::new();

    // ── pre-environment group
    rules.extend(dice_roll_rule());
    rules.extend(alias_rules(
        options.instruct,
        options.context,
        options.system_prompt,
    ));
    rules.extend(variable_rules(&vars));
    rules.extend(rule(r"(?i)\{\{newline\}\}", |_| Ok("\n".to_string())));
    rules.extend(rule(r"(?i)(?:\r?\n)*\{\{trim\}\}(?:\r?\n)*", |_| {
        Ok(String::new())
    }));
    rules.extend(rule(r"(?i)\{\{noop\}\}", |_| Ok(String::new())));

    // ── environment group
    // Keys are sorted so the substitution order is stable across
    // invocations; a map iteration would reshuffle the rules every call
    // and make nested environment tokens resolve unpredictably.
    let mut env_entries: Vec<(&String, &MacroValue)> = merged.iter().collect();
    env_entries.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in env_entries {
        let pattern = format!(r"(?i)\{{\{{{}\}}\}}", regex::escape(key));
        let value = value.clone();
        let nonce = nonce.clone();
        rules.extend(rule(&pattern, move |_| value.resolve(&nonce)));
    }

    // ── post-environment group
    rules.extend(rule(r"(?i)\{\{lastMessage\}\}", move |_| {
        Ok(last_message(messages))
    }));
    rules.extend(rule(r"(?i)\{\{lastUserMessage\}\}", move |_| {
        Ok(last_user_message(messages))
    }));
    rules.extend(rule(r"(?i)\{\{lastCharMessage\}\}", move |_| {
        Ok(last_char_message(messages))
    }));
    rules.extend(rule(r"(?i)\{\{reverse:(.+?)\}\}", |caps| {
        Ok(caps[1].chars().rev().collect())
    }));
    rules.extend(rule(r"(?s)\{\{//(.*?)\}\}", |_| Ok(String::new())));

    let time_text = now.format("%-I:%M %p").to_string();
    rules.extend(rule(r"(?i)\{\{time\}\}", move |_| Ok(time_text.clone())));
    let date_text = now.format("%B %-d, %Y").to_string();
    rules.extend(rule(r"(?i)\{\{date\}\}", move |_| Ok(date_text.clone())));
    let weekday_text = now.format("%A").to_string();
    rules.extend(rule(r"(?i)\{\{weekday\}\}", move |_| {
        Ok(weekday_text.clone())
    }));
    let isotime_text = now.format("%H:%M").to_string();
    rules.extend(rule(r"(?i)\{\{isotime\}\}", move |_| {
        Ok(isotime_text.clone())
    }));
    let isodate_text = now.format("%Y-%m-%d").to_string();
    rules.extend(rule(r"(?i)\{\{isodate\}\}", move |_| {
        Ok(isodate_text.clone())
    }));

    let now_utc = now.with_timezone(&Utc);
    rules.extend(rule(r"(?i)\{\{idle_duration\}\}", move |_| {
        Ok(idle_duration(messages, now_utc))
    }));
    rules.extend(random_pick_rule());

    let mut buffer = content.to_string();
    for macro_rule in &rules {
        // Once no open delimiter remains nothing downstream can match.
        if !buffer.contains("{{") {
            break;
        }
        buffer = apply_rule(macro_rule, &buffer);
    }

    drop(rules);
    ctx.variables = vars.into_inner();
    buffer
}

/// Applies one rule across the whole buffer. A failing replacer keeps the
/// matched text in place; emitted text is never re-scanned.
fn apply_rule(macro_rule: &MacroRule<'_>, buffer: &str) -> String {
    let mut out = String::with_capacity(buffer.len());
    let mut last = 0;
    for caps in macro_rule.pattern.captures_iter(buffer) {
        let Some(matched) = caps.get(0) else { continue };
        out.push_str(&buffer[last..matched.start()]);
        match (macro_rule.replace)(&caps) {
            Ok(replacement) => out.push_str(&replacement),
            Err(e) => {
                warn!(matched = matched.as_str(), error = %e, "macro substitution failed, keeping original text");
                out.push_str(matched.as_str());
            }
        }
        last = matched.end();
    }
    out.push_str(&buffer[last..]);
    out
}

/// `{{roll:FORMULA}}` where FORMULA is `N` (read as `1dN`) or `NdM`.
/// Anything unparsable or non-positive rolls to the empty string.
fn dice_roll_rule<'a>() -> Option<MacroRule<'a>> {
    rule(r"(?i)\{\{roll[ :]([^}]+)\}\}", |caps| {
        let trimmed = caps[1].trim();
        let formula = if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            format!("1d{trimmed}")
        } else {
            trimmed.to_string()
        };
        let Some((count, sides)) = formula.split_once(['d', 'D']) else {
            return Ok(String::new());
        };
        // Both segments must be bare digits; a sign is not a formula.
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(count) || !digits(sides) {
            return Ok(String::new());
        }
        let (Ok(count), Ok(sides)) = (count.parse::<i64>(), sides.parse::<i64>()) else {
            return Ok(String::new());
        };
        if count == 0 || sides == 0 {
            return Ok(String::new());
        }
        let mut rng = rand::rng();
        let total: i64 = (0..count).map(|_| rng.random_range(1..=sides)).sum();
        Ok(total.to_string())
    })
}

/// `{{random::a::b}}` or `{{random:a,b}}`. The comma form trims items and
/// honors backslash-escaped commas as literal ones.
fn random_pick_rule<'a>() -> Option<MacroRule<'a>> {
    rule(r"(?i)\{\{random\s?::?([^}]+)\}\}", |caps| {
        let body = &caps[1];
        let list: Vec<String> = if body.contains("::") {
            body.split("::").map(str::to_string).collect()
        } else {
            body.replace("\\,", "\u{0}")
                .split(',')
                .map(|item| item.trim().replace('\u{0}', ","))
                .collect()
        };
        if list.is_empty() {
            return Ok(String::new());
        }
        let mut rng = rand::rng();
        Ok(list[rng.random_range(0..list.len())].clone())
    })
}

/// The ten `{{setvar}}`-family rules, closing over the shared variable
/// store. Name and value segments are trimmed.
fn variable_rules<'a>(vars: &'a RefCell<VariableStore>) -> Vec<MacroRule<'a>> {
    let mut rules = Vec::new();
    for scope in [Scope::Local, Scope::Global] {
        let tag = match scope {
            Scope::Local => "",
            Scope::Global => "global",
        };
        rules.extend(rule(
            &format!(r"(?i)\{{\{{set{tag}var::([^:]+)::([^}}]*)\}}\}}"),
            move |caps| {
                vars.borrow_mut().set(scope, caps[1].trim(), caps[2].trim());
                Ok(String::new())
            },
        ));
        rules.extend(rule(
            &format!(r"(?i)\{{\{{add{tag}var::([^:]+)::([^}}]+)\}}\}}"),
            move |caps| {
                vars.borrow_mut().add(scope, caps[1].trim(), caps[2].trim());
                Ok(String::new())
            },
        ));
        rules.extend(rule(
            &format!(r"(?i)\{{\{{inc{tag}var::([^}}]+)\}}\}}"),
            move |caps| Ok(vars.borrow_mut().increment(scope, caps[1].trim())),
        ));
        rules.extend(rule(
            &format!(r"(?i)\{{\{{dec{tag}var::([^}}]+)\}}\}}"),
            move |caps| Ok(vars.borrow_mut().decrement(scope, caps[1].trim())),
        ));
        rules.extend(rule(
            &format!(r"(?i)\{{\{{get{tag}var::([^}}]+)\}}\}}"),
            move |caps| Ok(vars.borrow().get(scope, caps[1].trim())),
        ));
    }
    rules
}

fn non_empty_or(primary: &str, fallback: &str) -> String {
    if primary.is_empty() { fallback } else { primary }.to_string()
}

/// Alias macros derived from the instruct/context/system-prompt templates.
/// Each entry is a single case-insensitive alternation, so every name in
/// the set resolves to the identical value.
fn alias_rules<'a>(
    instruct: Option<&InstructTemplate>,
    context: Option<&ContextTemplate>,
    system_prompt: Option<&SystemPrompt>,
) -> Vec<MacroRule<'a>> {
    let field = |f: fn(&InstructTemplate) -> &str| -> String {
        instruct.map(|t| f(t).to_string()).unwrap_or_default()
    };
    let entries: Vec<(&str, String)> = vec![
        (
            "instructInput|instructUserPrefix",
            field(|t| &t.input_sequence),
        ),
        ("instructUserSuffix", field(|t| &t.input_suffix)),
        (
            "instructOutput|instructAssistantPrefix",
            field(|t| &t.output_sequence),
        ),
        (
            "instructSeparator|instructAssistantSuffix",
            field(|t| &t.output_suffix),
        ),
        ("instructSystemPrefix", field(|t| &t.system_sequence)),
        ("instructSystemSuffix", field(|t| &t.system_suffix)),
        (
            "instructFirstOutput|instructFirstAssistantPrefix",
            instruct
                .map(|t| non_empty_or(&t.first_output_sequence, &t.output_sequence))
                .unwrap_or_default(),
        ),
        (
            "instructLastOutput|instructLastAssistantPrefix",
            instruct
                .map(|t| non_empty_or(&t.last_output_sequence, &t.output_sequence))
                .unwrap_or_default(),
        ),
        (
            "instructFirstInput|instructFirstUserPrefix",
            instruct
                .map(|t| non_empty_or(&t.first_input_sequence, &t.input_sequence))
                .unwrap_or_default(),
        ),
        (
            "instructLastInput|instructLastUserPrefix",
            instruct
                .map(|t| non_empty_or(&t.last_input_sequence, &t.input_sequence))
                .unwrap_or_default(),
        ),
        ("instructStop", field(|t| &t.stop_sequence)),
        ("instructUserFiller", field(|t| &t.user_alignment_message)),
        (
            "instructSystemInstructionPrefix",
            field(|t| &t.last_system_sequence),
        ),
        (
            "instructStoryStringPrefix",
            field(|t| &t.story_string_prefix),
        ),
        (
            "instructStoryStringSuffix",
            field(|t| &t.story_string_suffix),
        ),
        (
            "systemPrompt|defaultSystemPrompt|instructSystem|instructSystemPrompt",
            system_prompt.map(|s| s.content.clone()).unwrap_or_default(),
        ),
        (
            "chatSeparator",
            context.map(|c| c.example_separator.clone()).unwrap_or_default(),
        ),
        (
            "chatStart",
            context.map(|c| c.chat_start.clone()).unwrap_or_default(),
        ),
    ];

    entries
        .into_iter()
        .filter_map(|(keys, value)| {
            rule(&format!(r"(?i)\{{\{{({keys})\}}\}}"), move |_| {
                Ok(value.clone())
            })
        })
        .collect()
}

fn last_message(messages: &[HistoryMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| !m.is_system)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn last_user_message(messages: &[HistoryMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.is_user && !m.is_system)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn last_char_message(messages: &[HistoryMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| !m.is_user && !m.is_system)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// Time since the user turn that prompted the most recent reply. The walk
/// deliberately skips the newest non-system message before it starts
/// looking for a user-authored one; this mirrors the original behavior
/// exactly, odd as it reads.
fn idle_duration(messages: &[HistoryMessage], now: DateTime<Utc>) -> String {
    let mut take_next = false;
    let mut reference = None;
    for msg in messages.iter().rev() {
        if msg.is_system {
            continue;
        }
        if msg.is_user && take_next {
            reference = Some(msg);
            break;
        }
        take_next = true;
    }

    let Some(timestamp) = reference.and_then(|m| m.timestamp) else {
        return "just now".to_string();
    };

    let seconds = (now - timestamp).num_seconds();
    if seconds < 60 {
        return "a few seconds".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return if minutes == 1 {
            "a minute".to_string()
        } else {
            format!("{minutes} minutes")
        };
    }
    let hours = minutes / 60;
    if hours < 24 {
        return if hours == 1 {
            "an hour".to_string()
        } else {
            format!("{hours} hours")
        };
    }
    let days = hours / 24;
    if days == 1 {
        "a day".to_string()
    } else {
        format!("{days} days")
    }
}
