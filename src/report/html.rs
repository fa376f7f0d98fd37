use super::types::{TestReport, TestResult};
use anyhow::Result;
use std::path::Path;

/// Generate HTML report
pub fn generate(report: &TestReport, output: Option<&Path>) -> Result<()> {
    let html = generate_html(report);

    if let Some(path) = output {
        std::fs::write(path, html)?;
        println!("HTML report saved to: {}", path.display());
    } else {
        println!("{}", html);
    }

    Ok(())
}

fn list_items(class: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let lis: String = items
        .iter()
        .map(|i| format!("<li>{}</li>", html_escape(i)))
        .collect();
    format!(r#"<ul class="{}">{}</ul>"#, class, lis)
}

fn result_card(result: &TestResult) -> String {
    let (badge, class) = if result.success {
        ("PASS", "passed")
    } else {
        ("FAIL", "failed")
    };

    let shots: String = result
        .screenshots
        .iter()
        .map(|p| {
            format!(
                r##"<a href="#" class="shot" data-path="{0}" onclick="showScreenshot(this.dataset.path, event)">📸 {0}</a>"##,
                html_escape(p)
            )
        })
        .collect();

    let meta = match (&result.scenario, result.duration_ms) {
        (Some(s), Some(d)) => format!("{} · {}", html_escape(s), format_duration(d)),
        (Some(s), None) => html_escape(s),
        (None, Some(d)) => format_duration(d),
        (None, None) => String::new(),
    };

    format!(
        r#"
        <div class="result {class}">
            <div class="result-header">
                <h3>{name} <span class="badge">{badge}</span></h3>
                <span class="meta">{meta}</span>
            </div>
            <div class="timestamp">{timestamp}</div>
            {errors}
            {warnings}
            <div class="shots">{shots}</div>
        </div>"#,
        class = class,
        name = html_escape(&result.test_name),
        badge = badge,
        meta = meta,
        timestamp = html_escape(&result.timestamp),
        errors = list_items("errors", &result.errors),
        warnings = list_items("warnings", &result.warnings),
        shots = shots,
    )
}

fn generate_html(report: &TestReport) -> String {
    let results_html: String = report.results.iter().map(result_card).collect();
    let pass_rate = report.pass_rate();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Smart Test Report - {timestamp}</title>
    <style>
        :root {{
            --bg: #0f172a;
            --panel: #1e293b;
            --border: #334155;
            --text: #f1f5f9;
            --muted: #94a3b8;
            --green: #22c55e;
            --red: #ef4444;
            --yellow: #eab308;
        }}
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: system-ui, -apple-system, sans-serif;
            background: var(--bg);
            color: var(--text);
            padding: 2rem 1rem;
        }}
        .container {{ max-width: 1000px; margin: 0 auto; }}
        h1 {{ font-size: 1.75rem; margin-bottom: 1.5rem; }}
        .stats {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(140px, 1fr));
            gap: 1rem;
            margin-bottom: 1.5rem;
        }}
        .stat {{
            background: var(--panel);
            border: 1px solid var(--border);
            border-radius: 8px;
            padding: 1rem;
        }}
        .stat-value {{ font-size: 1.5rem; font-weight: 700; }}
        .stat-label {{ color: var(--muted); font-size: 0.8rem; text-transform: uppercase; }}
        .stat.passed .stat-value {{ color: var(--green); }}
        .stat.failed .stat-value {{ color: var(--red); }}
        .progress {{ height: 8px; background: var(--panel); border-radius: 4px; margin-bottom: 2rem; }}
        .progress-fill {{ height: 100%; background: var(--green); border-radius: 4px; }}
        .result {{
            background: var(--panel);
            border: 1px solid var(--border);
            border-left: 4px solid var(--green);
            border-radius: 8px;
            padding: 1rem 1.25rem;
            margin-bottom: 1rem;
        }}
        .result.failed {{ border-left-color: var(--red); }}
        .result-header {{ display: flex; justify-content: space-between; align-items: baseline; }}
        .badge {{ font-size: 0.7rem; padding: 0.1rem 0.5rem; border-radius: 999px; background: var(--border); }}
        .result.passed .badge {{ color: var(--green); }}
        .result.failed .badge {{ color: var(--red); }}
        .meta, .timestamp {{ color: var(--muted); font-size: 0.8rem; }}
        ul {{ margin: 0.5rem 0 0 1.25rem; font-size: 0.875rem; }}
        ul.errors {{ color: var(--red); }}
        ul.warnings {{ color: var(--yellow); }}
        .shots {{ margin-top: 0.5rem; display: flex; flex-wrap: wrap; gap: 0.75rem; font-size: 0.8rem; }}
        .shot {{ color: var(--muted); }}
        #modal {{
            display: none;
            position: fixed;
            inset: 0;
            background: rgba(0, 0, 0, 0.85);
            align-items: center;
            justify-content: center;
        }}
        #modal.active {{ display: flex; }}
        #modal img {{ max-width: 90%; max-height: 90%; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Smart Test Report</h1>
        <div class="stats">
            <div class="stat"><div class="stat-value">{total}</div><div class="stat-label">Tests</div></div>
            <div class="stat passed"><div class="stat-value">{passed}</div><div class="stat-label">Passed</div></div>
            <div class="stat failed"><div class="stat-value">{failed}</div><div class="stat-label">Failed</div></div>
            <div class="stat"><div class="stat-value">{errors}</div><div class="stat-label">Errors</div></div>
            <div class="stat"><div class="stat-value">{warnings}</div><div class="stat-label">Warnings</div></div>
            <div class="stat"><div class="stat-value">{screenshots}</div><div class="stat-label">Screenshots</div></div>
        </div>
        <div class="progress"><div class="progress-fill" style="width: {pass_rate}%"></div></div>
        {results_html}
        <p class="meta">Generated: {timestamp}</p>
    </div>

    <div id="modal" onclick="this.classList.remove('active')">
        <img id="modal-img" src="" alt="Screenshot">
    </div>

    <script>
        function showScreenshot(path, event) {{
            document.getElementById('modal-img').src = path;
            document.getElementById('modal').classList.add('active');
            event.preventDefault();
        }}
    </script>
</body>
</html>"#,
        timestamp = html_escape(&report.timestamp),
        total = report.total_tests,
        passed = report.passed_tests,
        failed = report.failed_tests,
        errors = report.total_errors,
        warnings = report.total_warnings,
        screenshots = report.total_screenshots,
        pass_rate = pass_rate,
        results_html = results_html,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60000;
        let seconds = (ms % 60000) as f64 / 1000.0;
        format!("{}m {:.0}s", minutes, seconds)
    }
}
