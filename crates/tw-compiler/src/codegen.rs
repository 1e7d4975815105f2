//! Deterministic Playwright TypeScript rendering.
//!
//! Pure string assembly: identical input produces byte-identical output.
//! Unknown kinds and unrenderable shapes degrade to comment lines so a
//! partially-understood reply still yields a script the user can finish by
//! hand.

use tw_core::command::{Command, CommandKind};

/// Rendering knobs for one script.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Test title placed in the `test('...')` header.
    pub test_name: String,
    /// Emit the `@playwright/test` import line. Off when the caller embeds
    /// the body in an existing file.
    pub include_imports: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            test_name: "generated test".to_string(),
            include_imports: true,
        }
    }
}

/// Render a command list as a Playwright test.
pub fn generate(commands: &[Command], options: &CompileOptions) -> String {
    let mut out = String::new();
    if options.include_imports {
        out.push_str("import { test, expect } from '@playwright/test';\n\n");
    }
    out.push_str(&format!(
        "test({}, async ({{ page }}) => {{\n",
        ts_str(&options.test_name)
    ));
    for (index, command) in commands.iter().enumerate() {
        if let Some(description) = &command.description {
            out.push_str(&format!("  // {}\n", description.replace('\n', " ")));
        }
        out.push_str("  ");
        out.push_str(&render(command, index));
        out.push('\n');
    }
    out.push_str("});\n");
    out
}

/// One line per command. `index` feeds the default screenshot filename.
fn render(command: &Command, index: usize) -> String {
    let sel = command.selector.as_deref();
    let val = command.value.as_deref();
    match &command.kind {
        CommandKind::Navigate => match val {
            Some(url) => format!("await page.goto({});", ts_str(url)),
            None => "// navigate: missing value".to_string(),
        },
        CommandKind::Click => match sel {
            Some(sel) => format!("await page.locator({}).click();", ts_str(sel)),
            None => "// click: missing selector".to_string(),
        },
        CommandKind::Hover => match sel {
            Some(sel) => format!("await page.locator({}).hover();", ts_str(sel)),
            None => "// hover: missing selector".to_string(),
        },
        CommandKind::Fill => match (sel, val) {
            (Some(sel), Some(val)) => {
                format!("await page.locator({}).fill({});", ts_str(sel), ts_str(val))
            }
            _ => "// fill: missing selector or value".to_string(),
        },
        CommandKind::Type => match (sel, val) {
            (Some(sel), Some(val)) => {
                format!("await page.locator({}).type({});", ts_str(sel), ts_str(val))
            }
            _ => "// type: missing selector or value".to_string(),
        },
        CommandKind::Select => match (sel, val) {
            (Some(sel), Some(val)) => format!(
                "await page.locator({}).selectOption({});",
                ts_str(sel),
                ts_str(val)
            ),
            _ => "// select: missing selector or value".to_string(),
        },
        CommandKind::Press => match val {
            Some(key) => format!("await page.keyboard.press({});", ts_str(key)),
            None => "// press: missing value".to_string(),
        },
        CommandKind::Wait => match (sel, command.value_as_seconds()) {
            (Some(sel), _) => format!("await page.locator({}).waitFor();", ts_str(sel)),
            (None, Some(seconds)) => {
                format!("await page.waitForTimeout({});", (seconds * 1000.0).round() as u64)
            }
            (None, None) => match val {
                Some(v) => format!("// wait: unrecognized duration '{}'", v.replace('\n', " ")),
                None => "// wait: missing selector or value".to_string(),
            },
        },
        CommandKind::Assert => match (sel, val) {
            (Some(sel), Some(val)) => format!(
                "await expect(page.locator({})).toContainText({});",
                ts_str(sel),
                ts_str(val)
            ),
            (Some(sel), None) => format!(
                "await expect(page.locator({})).toBeVisible();",
                ts_str(sel)
            ),
            (None, Some(val)) => format!("await expect(page).toHaveURL({});", ts_str(val)),
            (None, None) => "// assert: nothing to check".to_string(),
        },
        CommandKind::Screenshot => {
            let path = val
                .map(String::from)
                .unwrap_or_else(|| format!("screenshot-{}.png", index + 1));
            match sel {
                Some(sel) => format!(
                    "await page.locator({}).screenshot({{ path: {} }});",
                    ts_str(sel),
                    ts_str(&path)
                ),
                None => format!(
                    "await page.screenshot({{ path: {}, fullPage: true }});",
                    ts_str(&path)
                ),
            }
        }
        CommandKind::Other(kind) => {
            format!("// unsupported command: {}", kind.replace('\n', " "))
        }
    }
}

/// Single-quoted TypeScript string literal.
fn ts_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
