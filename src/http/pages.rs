//! Static pages served by the proxy itself.

use std::fmt::Write;

use crate::routing::RouteTable;

/// Body of `/robots.txt`; crawlers are kept off every path.
pub const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>AI API Proxy</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f7fafc; color: #2d3748; margin: 0; padding: 40px 20px; }
        .container { max-width: 860px; margin: 0 auto; background: #fff; border-radius: 12px; padding: 40px; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.05); }
        .status { background: #f0fff4; color: #276749; border-radius: 8px; padding: 12px 16px; margin-bottom: 24px; }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 12px 16px; border-bottom: 1px solid #e2e8f0; }
        th { background: #edf2f7; }
        code { font-size: 0.95em; }
        .footer { margin-top: 40px; text-align: center; font-size: 0.9em; color: #a0aec0; }
    </style>
</head>
<body>
<div class="container">
    <h1>AI API Proxy</h1>
    <div class="status">Service is active and running</div>
    <p>Requests to <code>/&lt;prefix&gt;/...</code> are forwarded to the provider listed below, with the prefix removed.</p>
    <h2>Available Endpoints</h2>
    <table>
        <thead><tr><th>Path Prefix</th><th>Target Service URL</th></tr></thead>
        <tbody>
"#;

/// Render the homepage listing every route, sorted by prefix.
pub fn render_home(routes: &RouteTable) -> String {
    let mut page = String::from(HEAD);
    for route in routes.routes() {
        let _ = writeln!(
            page,
            "            <tr><td><code>{}</code></td><td>{}</td></tr>",
            html_escape::encode_text(route.prefix()),
            html_escape::encode_text(route.upstream().origin()),
        );
    }
    let _ = write!(
        page,
        "        </tbody>\n    </table>\n    <div class=\"footer\">AI API Proxy v{}</div>\n</div>\n</body>\n</html>\n",
        env!("CARGO_PKG_VERSION"),
    );
    page
}
