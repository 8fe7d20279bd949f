pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// A page that immediately POSTs `fields` to `action` from the browser.
pub fn auto_post_form(action: &str, fields: &[(&str, &str)]) -> String {
    let inputs: String = fields
        .iter()
        .map(|(name, value)| {
            format!(
                "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                escape_html(name),
                escape_html(value)
            )
        })
        .collect();
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"></head><body>\
         <form id=\"f\" method=\"POST\" action=\"{}\">{inputs}</form>\
         <script>document.getElementById('f').submit()</script>\
         </body></html>",
        escape_html(action)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_escapes_action_and_values() {
        let html = auto_post_form("https://p.example/return?a=1&b=\"2\"", &[("JWT", "x<y")]);
        assert!(html.contains("action=\"https://p.example/return?a=1&amp;b=&quot;2&quot;\""));
        assert!(html.contains("name=\"JWT\" value=\"x&lt;y\""));
        assert!(html.contains("submit()"));
    }
}
