//! HTML diagnostic report ("a fixed CSS scaffold, one labeled
//! block per error grouped by line, with `^` caret markers").

use crate::diagnostic::Diagnostic;

const CSS: &str = r#"
body { font-family: monospace; background: #1e1e1e; color: #d4d4d4; padding: 2rem; }
h1 { color: #f48771; font-size: 1.1rem; }
.error { background: #2d2020; border-left: 3px solid #f48771; margin: 0.75rem 0; padding: 0.5rem 1rem; }
.error .location { color: #9cdcfe; }
.error .message { color: #f48771; font-weight: bold; }
.error .suggestion { color: #ce9178; }
.caret { color: #f48771; white-space: pre; }
"#;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Renders one `<div class="error">` per diagnostic, in source order, with a
/// `^` caret placed under the reported column.
pub fn render(source_path: &str, source: &str, diagnostics: &[Diagnostic]) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut body = String::new();
    for d in diagnostics {
        let line_text = lines.get((d.position.line as usize).saturating_sub(1)).copied().unwrap_or("");
        let caret_offset = (d.position.column as usize).saturating_sub(1);
        let caret = format!("{}^", " ".repeat(caret_offset));
        body.push_str("<div class=\"error\">\n");
        body.push_str(&format!("  <div class=\"location\">{}:{}</div>\n", escape_html(source_path), d.position));
        body.push_str(&format!("  <div class=\"message\">{}</div>\n", escape_html(&d.message)));
        if let Some(s) = &d.suggestion {
            body.push_str(&format!("  <div class=\"suggestion\">did you mean '{}'?</div>\n", escape_html(s)));
        }
        body.push_str(&format!("  <pre>{}</pre>\n", escape_html(line_text)));
        body.push_str(&format!("  <div class=\"caret\">{}</div>\n", escape_html(&caret)));
        body.push_str("</div>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Type errors: {path}</title>\n<style>{css}</style>\n</head>\n<body>\n<h1>{count} error(s) in {path}</h1>\n{body}</body>\n</html>\n",
        path = escape_html(source_path),
        css = CSS,
        count = diagnostics.len(),
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Position;

    #[test]
    fn renders_one_error_div_per_diagnostic() {
        let diags = vec![
            Diagnostic::error("unknown identifier 'x'", Position::new(1, 5, 4)),
            Diagnostic::error("unexpected token", Position::new(2, 1, 10)),
        ];
        let html = render("test.ts", "let = 1;\nfoo bar", &diags);
        assert_eq!(html.matches("class=\"error\"").count(), 2);
        assert!(html.contains("unknown identifier"));
        assert!(html.contains("unexpected token"));
    }

    #[test]
    fn escapes_html_special_characters_in_messages() {
        let diags = vec![Diagnostic::error("type '<T>' is not assignable", Position::start())];
        let html = render("a.ts", "", &diags);
        assert!(html.contains("&lt;T&gt;"));
        assert!(!html.contains("<T>"));
    }

    #[test]
    fn caret_lines_up_under_reported_column() {
        let diags = vec![Diagnostic::error("oops", Position::new(1, 5, 4))];
        let html = render("a.ts", "let x y;", &diags);
        assert!(html.contains("    ^"));
    }
}
