//! HTML pages served by the server.

use pdbcharges_web::{charges::ChargeSummary, code::StructureCode, warnings::ResidueWarning};

/// Replace the characters that are significant in HTML text and attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Message shown above the code form.
pub enum Notice<'a> {
    Message(&'a str),
    NoResults(&'a StructureCode),
}

impl Notice<'_> {
    fn render(&self) -> String {
        match self {
            Self::Message(text) => format!("<div class=\"notice\">{}</div>", escape(text)),
            Self::NoResults(code) => format!(
                concat!(
                    "<div class=\"notice\">There are no results for structure with PDB ID ",
                    "<strong>{}</strong>. The possible causes are:<ul>",
                    "<li>A structure with such a PDB ID does not exist.</li>",
                    "<li>The structure with hydrogens has more than 99999 atoms.</li>",
                    "<li>The structure contains serious errors and cannot be used as input ",
                    "for calculating the partial atomic charges.</li></ul></div>",
                ),
                escape(code.as_str())
            ),
        }
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n",
            "<meta charset=\"utf-8\">\n",
            "<title>{}</title>\n",
            "</head>\n<body>\n{}\n</body>\n</html>\n",
        ),
        escape(title),
        body
    )
}

const CODE_FORM: &str = concat!(
    "<form method=\"post\" action=\"/\">",
    "<label for=\"code\">PDB ID</label> ",
    "<input id=\"code\" name=\"code\" type=\"text\" maxlength=\"16\" required> ",
    "<button type=\"submit\">Show charges</button>",
    "</form>",
);

pub fn index(notice: Option<Notice>) -> String {
    let notice = notice.map(|n| n.render()).unwrap_or_default();
    layout(
        "PDB charges",
        &format!("<h1>Partial atomic charges of PDB structures</h1>\n{notice}\n{CODE_FORM}"),
    )
}

/// Index page explaining why `code` has no results.
pub fn no_results(code: &StructureCode) -> String {
    index(Some(Notice::NoResults(code)))
}

/// Integral totals are shown without decimals, anything else to 4 places.
fn format_charge(value: f64) -> String {
    // Avoid printing "-0"
    let value = if value == 0.0 { 0.0 } else { value };
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

/// Keep embedded JSON from terminating its script element.
fn embed_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

pub fn results(
    code: &StructureCode,
    summary: &ChargeSummary,
    warnings: &[ResidueWarning],
    remapped_json: &str,
) -> String {
    let code_html = escape(code.as_str());
    let max_abs = summary.max_abs_charge.map(format_charge).unwrap_or_else(|| "none".into());

    let mut body = format!(
        concat!(
            "<h1>Structure <strong>{code}</strong></h1>\n",
            "<table class=\"summary\">\n",
            "<tr><th>Atoms</th><td>{atoms}</td></tr>\n",
            "<tr><th>Atoms without charge</th><td>{unknown}</td></tr>\n",
            "<tr><th>Total charge</th><td>{total}</td></tr>\n",
            "<tr><th>Largest absolute charge</th><td>{max_abs}</td></tr>\n",
            "</table>\n",
            "<p><a href=\"/download_files?code={code}\">Download charges</a> ",
            "<a href=\"/structure/{code}\">Structure with charges (mmCIF)</a></p>\n",
        ),
        code = code_html,
        atoms = summary.atom_count,
        unknown = summary.unknown_count,
        total = format_charge(summary.total_charge),
        max_abs = max_abs,
    );

    if !warnings.is_empty() {
        body.push_str("<h2>Warnings</h2>\n<table class=\"warnings\">\n");
        body.push_str("<tr><th>Chain</th><th>Residue</th><th>Name</th><th>Warning</th></tr>\n");
        for w in warnings {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&w.chain_id),
                escape(&w.residue_id),
                escape(&w.residue_name),
                escape(&w.warning)
            ));
        }
        body.push_str("</table>\n");
    }

    // Read by structure viewers embedding the page
    body.push_str(&format!(
        "<script id=\"residual-warnings\" type=\"application/json\">{}</script>",
        embed_json(remapped_json)
    ));
    layout(&format!("{} charges", code.as_str()), &body)
}

pub fn not_found() -> String {
    layout("Not found", "<h1>404</h1>\n<p>The requested page does not exist.</p>\n<p><a href=\"/\">Back</a></p>")
}

pub fn internal_error() -> String {
    layout(
        "Error",
        "<h1>Something went wrong</h1>\n<p>The results could not be processed.</p>\n<p><a href=\"/\">Back</a></p>",
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn test_format_charge() {
        assert_eq!(format_charge(-0.0), "0");
        assert_eq!(format_charge(-3.0), "-3");
        assert_eq!(format_charge(0.25), "0.2500");
    }

    #[test]
    fn test_results_page() {
        let code = StructureCode::parse("1tst").unwrap();
        let summary = ChargeSummary { atom_count: 3, unknown_count: 1, total_charge: 1.0, max_abs_charge: Some(1.5) };
        let warnings = vec![ResidueWarning {
            chain_id: "A".into(),
            residue_id: "10".into(),
            residue_name: "GLY".into(),
            warning: "<missing> atoms".into(),
        }];
        let page = results(&code, &summary, &warnings, r#"[{"warning": "</script>"}]"#);
        assert!(page.contains("<tr><th>Total charge</th><td>1</td></tr>"));
        assert!(page.contains("<td>1.5000</td>"));
        assert!(page.contains("&lt;missing&gt; atoms"));
        assert!(page.contains(r#"[{"warning": "<\/script>"}]"#));
        assert!(page.contains("/download_files?code=1tst"));
        // Pages must stand on their own, no asset is shipped under /static
        assert!(!page.contains("/static/"));
        assert!(!index(None).contains("/static/"));
    }

    #[test]
    fn test_no_results_notice() {
        let code = StructureCode::parse("9zzz").unwrap();
        let page = no_results(&code);
        assert!(page.contains("<strong>9zzz</strong>"));
        assert!(page.contains(CODE_FORM));
    }
}
