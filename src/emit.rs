//! CSS text for a generated rule stream.
//!
//! Consecutive rules of the same breakpoint share one `@media` block, so the
//! order of the stream is preserved verbatim in the output.

use crate::sequencer::{Declaration, GeneratedRule};
use crate::variant::Breakpoint;

pub fn emit_css<I>(rules: I, minify: bool) -> String
where
    I: IntoIterator<Item = GeneratedRule>,
{
    let mut blocks = Vec::new();
    let mut pending: Option<(Breakpoint, Vec<String>)> = None;

    for rule in rules {
        let css = render_rule(&rule, minify);
        let Some(breakpoint) = rule.breakpoint else {
            flush_breakpoint_group(&mut pending, &mut blocks, minify);
            blocks.push(css);
            continue;
        };
        match pending.as_mut() {
            Some((current, group)) if *current == breakpoint => group.push(css),
            _ => {
                flush_breakpoint_group(&mut pending, &mut blocks, minify);
                pending = Some((breakpoint, vec![css]));
            }
        }
    }
    flush_breakpoint_group(&mut pending, &mut blocks, minify);

    if minify {
        blocks.join("")
    } else {
        blocks.join("\n")
    }
}

fn flush_breakpoint_group(
    pending: &mut Option<(Breakpoint, Vec<String>)>,
    blocks: &mut Vec<String>,
    minify: bool,
) {
    if let Some((breakpoint, rules)) = pending.take() {
        blocks.push(render_breakpoint_group(&breakpoint, &rules, minify));
    }
}

fn render_breakpoint_group(breakpoint: &Breakpoint, rules: &[String], minify: bool) -> String {
    let body = if minify {
        rules.join("")
    } else {
        rules.join("\n")
    };
    wrap_block(&format!("@media {}", breakpoint.condition()), &body, minify)
}

fn render_rule(rule: &GeneratedRule, minify: bool) -> String {
    let css = if minify {
        format!(
            "{}{{{}}}",
            rule.selector,
            format_declarations(&rule.declarations, true)
        )
    } else {
        format!(
            "{} {{\n{}\n}}",
            rule.selector,
            indent_css_block(&format_declarations(&rule.declarations, false), 2)
        )
    };
    match rule.at_rule.as_deref() {
        Some(at_rule) => wrap_block(at_rule, &css, minify),
        None => css,
    }
}

fn format_declarations(declarations: &[Declaration], minify: bool) -> String {
    if minify {
        return declarations
            .iter()
            .map(|decl| format!("{}:{}", decl.property.trim(), decl.value.trim()))
            .collect::<Vec<_>>()
            .join(";");
    }
    declarations
        .iter()
        .map(|decl| format!("{}: {};", decl.property.trim(), decl.value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_block(header: &str, body: &str, minify: bool) -> String {
    if minify {
        format!("{}{{{}}}", header.trim(), body)
    } else {
        format!("{} {{\n{}\n}}", header.trim(), indent_css_block(body, 2))
    }
}

fn indent_css_block(css: &str, spaces: usize) -> String {
    let padding = " ".repeat(spaces);
    css.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", padding, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
