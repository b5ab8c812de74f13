//! Server-rendered HTML pages
//!
//! Inline templates in the style of a small API gateway: a home page, a
//! statistics dashboard and a prediction form posting back to `/predict`.

use std::collections::{BTreeMap, HashMap};

use agri_yield_core::RAW_FEATURES;
use agri_yield_service::{PredictionResult, YieldStatistics};
use axum::extract::{Form, State};
use axum::response::Html;
use tracing::warn;

use crate::server::SharedState;

const STYLE: &str = r#"
    <style>
        body {
            font-family: Arial, sans-serif;
            max-width: 860px;
            margin: 40px auto;
            padding: 20px;
            background: #f5f5f5;
        }
        .container {
            background: white;
            padding: 30px;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        h1 {
            color: #333;
            border-bottom: 3px solid #4CAF50;
            padding-bottom: 10px;
        }
        nav a { margin-right: 16px; color: #2e7d32; }
        table { border-collapse: collapse; width: 100%; }
        td, th { padding: 8px; border-bottom: 1px solid #eee; text-align: left; }
        label { display: inline-block; width: 220px; }
        input { margin: 4px 0; padding: 4px; }
        .error { color: #b71c1c; background: #ffebee; padding: 10px; border-radius: 4px; }
        .result { background: #e8f5e9; padding: 12px; border-radius: 4px; }
        .high { color: #b71c1c; }
        .medium { color: #e65100; }
    </style>
"#;

/// Default values pre-filled in the prediction form
const FORM_DEFAULTS: [f64; 10] = [25.0, 800.0, 65.0, 6.5, 25.0, 15.0, 20.0, 120.0, 250.0, 5.0];

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
{STYLE}
</head>
<body>
    <div class="container">
        <nav><a href="/">Home</a><a href="/dashboard">Dashboard</a><a href="/predict">Predict</a></nav>
        <h1>{title}</h1>
{body}
    </div>
</body>
</html>
"#
    ))
}

pub(crate) async fn index() -> Html<String> {
    page(
        "Agriculture Yield Predictor",
        r#"        <p>Predict crop yield in tons per hectare from weather, soil and farming inputs.</p>
        <h2>Available Endpoints:</h2>
        <ul>
            <li><code>POST /api/predict</code> - Predict yield from the ten input fields</li>
            <li><code>GET /api/historical?limit=100</code> - Most recent historical records</li>
            <li><code>GET /api/statistics</code> - Yield statistics of the dataset</li>
            <li><code>GET /api/health</code> - Health check</li>
        </ul>"#,
    )
}

pub(crate) async fn dashboard(State(state): State<SharedState>) -> Html<String> {
    let stats = match state.data.get_statistics() {
        Ok(stats) => stats,
        Err(err) => {
            warn!("Dashboard statistics unavailable: {}", err);
            None
        }
    };
    page("Yield Dashboard", &render_statistics(stats.as_ref()))
}

fn render_statistics(stats: Option<&YieldStatistics>) -> String {
    let Some(stats) = stats else {
        return "        <p>No data available.</p>".to_string();
    };
    format!(
        r#"        <table>
            <tr><th>Total records</th><td>{}</td></tr>
            <tr><th>Average yield</th><td>{}</td></tr>
            <tr><th>Maximum yield</th><td>{}</td></tr>
            <tr><th>Minimum yield</th><td>{}</td></tr>
            <tr><th>Standard deviation</th><td>{}</td></tr>
        </table>"#,
        stats.total_records, stats.average_yield, stats.max_yield, stats.min_yield, stats.std_yield
    )
}

pub(crate) async fn predict_form() -> Html<String> {
    page("Predict Crop Yield", &render_prediction(&BTreeMap::new(), None, None))
}

pub(crate) async fn predict_submit(
    State(state): State<SharedState>,
    Form(form): Form<BTreeMap<String, String>>,
) -> Html<String> {
    let input = match parse_form(&form) {
        Ok(input) => input,
        Err(message) => return page("Predict Crop Yield", &render_prediction(&form, None, Some(&message))),
    };

    let values: HashMap<String, f64> = input.into_iter().collect();
    let body = match state.prediction.predict_yield(&values) {
        Ok(result) => render_prediction(&form, Some(&result), None),
        Err(err) => render_prediction(&form, None, Some(&err.to_string())),
    };
    page("Predict Crop Yield", &body)
}

/// Parse every submitted field as a float
fn parse_form(form: &BTreeMap<String, String>) -> Result<BTreeMap<String, f64>, String> {
    form.iter()
        .map(|(key, raw)| {
            raw.trim()
                .parse::<f64>()
                .map(|v| (key.clone(), v))
                .map_err(|_| format!("could not convert string to float: '{raw}'"))
        })
        .collect()
}

fn render_prediction(
    submitted: &BTreeMap<String, String>,
    result: Option<&PredictionResult>,
    error: Option<&str>,
) -> String {
    let mut out = String::new();

    if let Some(message) = error {
        out.push_str(&format!("        <p class=\"error\">{}</p>\n", escape_html(message)));
    }

    if let Some(result) = result {
        out.push_str(&format!(
            "        <div class=\"result\">\n            <h2>{} {}</h2>\n            <p>Confidence interval: {} - {} (score {})</p>\n",
            result.predicted_yield,
            escape_html(&result.unit),
            result.confidence_interval.lower,
            result.confidence_interval.upper,
            result.confidence_score
        ));
        if !result.recommendations.is_empty() {
            out.push_str("            <ul>\n");
            for rec in &result.recommendations {
                out.push_str(&format!(
                    "                <li class=\"{}\">{}</li>\n",
                    rec.priority.as_str(),
                    escape_html(&rec.message)
                ));
            }
            out.push_str("            </ul>\n");
        }
        out.push_str("        </div>\n");
    }

    out.push_str("        <form method=\"post\" action=\"/predict\">\n");
    for (name, default) in RAW_FEATURES.iter().zip(FORM_DEFAULTS) {
        let value = submitted
            .get(*name)
            .cloned()
            .unwrap_or_else(|| default.to_string());
        out.push_str(&format!(
            "            <div><label for=\"{name}\">{name}</label><input id=\"{name}\" name=\"{name}\" value=\"{}\"></div>\n",
            escape_html(&value)
        ));
    }
    out.push_str("            <button type=\"submit\">Predict</button>\n        </form>");
    out
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form_reports_bad_value() {
        let mut form = BTreeMap::new();
        form.insert("rainfall_mm".to_string(), "400".to_string());
        form.insert("soil_ph".to_string(), "acidic".to_string());

        let err = parse_form(&form).unwrap_err();
        assert_eq!(err, "could not convert string to float: 'acidic'");

        form.insert("soil_ph".to_string(), " 5.5 ".to_string());
        assert_eq!(parse_form(&form).unwrap()["soil_ph"], 5.5);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_statistics_fallback() {
        assert!(render_statistics(None).contains("No data available"));
    }

    #[test]
    fn test_form_keeps_submitted_values() {
        let mut form = BTreeMap::new();
        form.insert("temperature_avg".to_string(), "31".to_string());
        let html = render_prediction(&form, None, Some("bad <input>"));

        assert!(html.contains("value=\"31\""));
        assert!(html.contains("bad &lt;input&gt;"));
        assert!(html.contains("name=\"area_hectares\""));
    }
}
