// Server-rendered HTML pages

use crate::core::types::{AnalysisResult, DiseaseRecord, Flash};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f4f8f2; color: #1d2b1f; }
header { background: #2e7d32; color: #fff; padding: 1rem 2rem; }
header a { color: #fff; margin-right: 1.5rem; text-decoration: none; }
main { max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
.flash { padding: .75rem 1rem; border-radius: 4px; margin-bottom: 1rem; }
.flash-error { background: #fdecea; color: #8a1c1c; }
.flash-warning { background: #fff8e1; color: #7a5b00; }
.flash-info { background: #e3f2fd; color: #0d47a1; }
.card { background: #fff; border-radius: 6px; padding: 1.5rem; margin-bottom: 1.5rem; box-shadow: 0 1px 3px rgba(0,0,0,.1); }
.confidence { font-size: 1.4rem; font-weight: 600; }
img.result { max-width: 100%; border-radius: 4px; }
"#;

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|flash| {
            format!(
                r#"<div class="flash flash-{}">{}</div>"#,
                flash.level.as_str(),
                escape_html(&flash.message)
            )
        })
        .collect()
}

fn layout(title: &str, flashes: &[Flash], body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} - Leaf Disease Detector</title>
<style>{style}</style>
</head>
<body>
<header><a href="/"><strong>Leaf Disease Detector</strong></a><a href="/">Analyze</a><a href="/browse">Disease Library</a></header>
<main>
{flashes}
{body}
</main>
</body>
</html>
"#,
        title = escape_html(title),
        style = STYLE,
        flashes = render_flashes(flashes),
        body = body,
    )
}

/// Camera capture: fills the hidden `image_data` field with a JPEG data URL
/// taken from the live video frame, then submits the upload form.
const CAPTURE_SCRIPT: &str = r#"
(function () {
  var form = document.getElementById('upload-form');
  var field = document.getElementById('image_data');
  var fileInput = document.getElementById('file');
  var video = document.getElementById('camera');
  var canvas = document.getElementById('capture-canvas');
  var preview = document.getElementById('captured-image');
  var startBtn = document.getElementById('start-camera');
  var captureBtn = document.getElementById('capture-btn');
  var retakeBtn = document.getElementById('retake-btn');
  var useBtn = document.getElementById('use-photo-btn');
  var stream = null;

  if (!navigator.mediaDevices || !navigator.mediaDevices.getUserMedia) {
    startBtn.disabled = true;
    startBtn.textContent = 'Camera not supported';
    return;
  }

  function show(el, visible) { el.style.display = visible ? '' : 'none'; }

  function stop() {
    if (stream) {
      stream.getTracks().forEach(function (track) { track.stop(); });
      stream = null;
    }
  }

  startBtn.addEventListener('click', function () {
    navigator.mediaDevices.getUserMedia({ video: { facingMode: 'environment' }, audio: false })
      .then(function (s) {
        stream = s;
        video.srcObject = s;
        show(video, true);
        show(captureBtn, true);
        show(preview, false);
        show(retakeBtn, false);
        show(useBtn, false);
      })
      .catch(function (err) {
        startBtn.textContent = 'Camera unavailable';
        console.error('Camera error:', err);
      });
  });

  captureBtn.addEventListener('click', function () {
    canvas.width = video.videoWidth;
    canvas.height = video.videoHeight;
    canvas.getContext('2d').drawImage(video, 0, 0, canvas.width, canvas.height);
    preview.src = canvas.toDataURL('image/jpeg');
    stop();
    show(video, false);
    show(captureBtn, false);
    show(preview, true);
    show(retakeBtn, true);
    show(useBtn, true);
  });

  retakeBtn.addEventListener('click', function () { startBtn.click(); });

  useBtn.addEventListener('click', function () {
    field.value = canvas.toDataURL('image/jpeg');
    fileInput.value = '';
    form.submit();
  });
})();
"#;

/// Upload form with file picker and camera capture
pub fn index_page(flashes: &[Flash]) -> String {
    let body = format!(
        r#"<section class="card">
<h1>Check a leaf</h1>
<p>Upload a clear photo of a single leaf (PNG or JPEG, up to 16MB).</p>
<form id="upload-form" action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="file" id="file" accept=".png,.jpg,.jpeg,image/png,image/jpeg">
<input type="hidden" name="image_data" id="image_data">
<button type="submit">Analyze</button>
</form>
</section>
<section class="card">
<h2>Or take a photo</h2>
<button type="button" id="start-camera">Start camera</button>
<video id="camera" autoplay playsinline style="display:none"></video>
<canvas id="capture-canvas" style="display:none"></canvas>
<img id="captured-image" class="result" alt="Captured leaf" style="display:none">
<p>
<button type="button" id="capture-btn" style="display:none">Capture</button>
<button type="button" id="retake-btn" style="display:none">Retake</button>
<button type="button" id="use-photo-btn" style="display:none">Analyze this photo</button>
</p>
</section>
<script>{script}</script>"#,
        script = CAPTURE_SCRIPT,
    );
    layout("Analyze", flashes, &body)
}

/// Analysis outcome for the session's latest upload
pub fn results_page(
    result: &AnalysisResult,
    image_src: &str,
    highlighted: bool,
    flashes: &[Flash],
) -> String {
    let areas: String = result
        .affected_areas
        .iter()
        .map(|a| {
            format!(
                "<li>{}x{} at ({}, {})</li>",
                a.width, a.height, a.x, a.y
            )
        })
        .collect();
    let areas = if areas.is_empty() {
        "<p>No affected areas detected.</p>".to_string()
    } else {
        format!("<ul class=\"areas\">{}</ul>", areas)
    };

    let toggle = if result.affected_areas.is_empty() {
        String::new()
    } else if highlighted {
        r#"<p><a href="/results">Hide affected areas</a></p>"#.to_string()
    } else {
        r#"<p><a href="/results?highlight=true">Highlight affected areas</a></p>"#.to_string()
    };

    let body = format!(
        r#"<section class="card">
<h1>{name}</h1>
<p class="confidence">Confidence: {confidence}</p>
<img class="result" src="{src}" alt="Analyzed leaf" width="{width}" height="{height}">
{toggle}
</section>
<section class="card"><h2>Description</h2><p>{description}</p></section>
<section class="card"><h2>Treatment</h2><p>{treatment}</p></section>
<section class="card"><h2>Prevention</h2><p>{prevention}</p></section>
<section class="card"><h2>Affected areas</h2>{areas}</section>
<p><a href="/">Analyze another leaf</a></p>"#,
        name = escape_html(&result.disease_name),
        confidence = result.confidence_label(),
        src = escape_html(image_src),
        width = result.display_size.width,
        height = result.display_size.height,
        toggle = toggle,
        description = escape_html(&result.description),
        treatment = escape_html(&result.treatment),
        prevention = escape_html(&result.prevention),
        areas = areas,
    );
    layout("Results", flashes, &body)
}

/// Every catalog record
pub fn browse_page(records: &[DiseaseRecord], flashes: &[Flash]) -> String {
    let cards: String = records
        .iter()
        .map(|record| {
            format!(
                r#"<section class="card" id="disease-{id}">
<h2>{name}</h2>
<p><em>Affects: {crops}</em></p>
<p>{description}</p>
<h3>Treatment</h3><p>{treatment}</p>
<h3>Prevention</h3><p>{prevention}</p>
</section>"#,
                id = record.id,
                name = escape_html(&record.name),
                crops = escape_html(&record.crops.join(", ")),
                description = escape_html(&record.description),
                treatment = escape_html(&record.treatment),
                prevention = escape_html(&record.prevention),
            )
        })
        .collect();
    layout(
        "Disease Library",
        flashes,
        &format!("<h1>Disease Library</h1>\n{}", cards),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AffectedArea, Dimensions, ResultImage};
    use crate::services::catalog::DiseaseCatalog;
    use std::time::SystemTime;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#x27;y&#x27;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_flashes_rendered_escaped() {
        let page = index_page(&[Flash::error("bad <file>")]);
        assert!(page.contains(r#"class="flash flash-error""#));
        assert!(page.contains("bad &lt;file&gt;"));
        assert!(page.contains(r#"name="file""#));
        assert!(page.contains(r#"name="image_data""#));
    }

    #[test]
    fn test_index_wires_camera_capture_to_form() {
        let page = index_page(&[]);
        assert!(page.contains(r#"<form id="upload-form""#));
        assert!(page.contains(r#"id="image_data""#));
        assert!(page.contains("getUserMedia"));
        assert!(page.contains("field.value = canvas.toDataURL('image/jpeg')"));
        assert!(page.contains("document.getElementById('upload-form')"));
        for id in ["camera", "capture-canvas", "capture-btn", "use-photo-btn"] {
            assert!(page.contains(&format!(r#"id="{}""#, id)), "missing #{id}");
        }
    }

    #[test]
    fn test_results_page_shows_diagnosis() {
        let result = AnalysisResult {
            image: ResultImage::Stored {
                id: crate::core::types::ResultId::generate(),
            },
            disease_id: 2,
            disease_name: "Powdery Mildew".into(),
            confidence: 91.04,
            description: "White spots".into(),
            treatment: "Sulfur".into(),
            prevention: "Airflow".into(),
            affected_areas: vec![AffectedArea {
                x: 1,
                y: 2,
                width: 50,
                height: 60,
            }],
            analysis_size: Dimensions::new(512, 384),
            display_size: Dimensions::new(600, 450),
            created_at: SystemTime::now(),
        };
        let page = results_page(&result, "/results/image/abc", false, &[]);
        assert!(page.contains("Powdery Mildew"));
        assert!(page.contains("91.0%"));
        assert!(page.contains(r#"src="/results/image/abc""#));
        assert!(page.contains("50x60 at (1, 2)"));
        assert!(page.contains("/results?highlight=true"));
    }

    #[test]
    fn test_browse_lists_every_record() {
        let catalog = DiseaseCatalog::builtin();
        let page = browse_page(catalog.all(), &[]);
        for record in catalog.all() {
            assert!(page.contains(&escape_html(&record.name)));
        }
    }
}
