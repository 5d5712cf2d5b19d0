// 该文件是 Cheshang （车伤） 项目的一部分。
// src/web/page.rs - 页面渲染
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};

use crate::{
  output::summary::{NO_DAMAGE_MESSAGE, assessment_lines, detection_rows},
  task::Assessment,
};

const TITLE: &str = "Car Damage Detection System";

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:auto;padding:1em}\
  .cols{display:flex;gap:2em}.cols>div{flex:1}img{max-width:100%}\
  table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:.3em .8em}\
  .error{background:#fdecea;padding:1em}.info{background:#e8f4fd;padding:1em}";

const GUIDELINES: &str = r#"<h2>📸 Photo Guidelines</h2>
<div class="cols">
<div><h3>Do's:</h3><ul>
<li>Take photos from 10-15 feet away</li>
<li>Ensure good lighting conditions</li>
<li>Capture the entire car section</li>
<li>Use landscape orientation</li>
<li>Keep the camera steady</li>
</ul></div>
<div><h3>Don'ts:</h3><ul>
<li>Don't take extremely close-up shots</li>
<li>Avoid poor lighting or shadows</li>
<li>Don't take blurry photos</li>
<li>Avoid extreme angles</li>
<li>Don't crop the damaged area</li>
</ul></div>
</div>"#;

const UPLOAD_FORM: &str = r#"<form action="/assess" method="post" enctype="multipart/form-data">
<label>Upload an image (recommended size: 640x640)
<input type="file" name="image" accept=".png,.jpg,.jpeg,image/png,image/jpeg" required></label>
<button type="submit">Detect damage</button>
</form>"#;

const USAGE: &str = r#"<hr><h3>How to use:</h3><ol>
<li>Review the photo guidelines above</li>
<li>Upload a photo of the car damage</li>
<li>Wait for the system to process the image</li>
<li>Review the detected damages and assessment</li>
</ol>
<p>Note: For best results, ensure your photos follow the guidelines and are well-lit.</p>"#;

pub fn escape_html(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c),
    }
  }
  escaped
}

fn layout(body: &str) -> String {
  format!(
    "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
     <style>{STYLE}</style></head><body><h1>{title}</h1>\n{GUIDELINES}\n{UPLOAD_FORM}\n{body}\n{USAGE}\n</body></html>",
    title = TITLE,
  )
}

fn png_data_uri(image: &RgbImage) -> Result<String, image::ImageError> {
  let mut bytes = Vec::new();
  image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
  Ok(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)))
}

pub fn index_page() -> String {
  layout("")
}

pub fn error_page(message: &str) -> String {
  layout(&format!(
    "<div class=\"error\">Error processing image: {}</div>\n\
     <div class=\"info\">Please try uploading a different image.</div>",
    escape_html(message)
  ))
}

pub fn result_page(assessment: &Assessment) -> Result<String, image::ImageError> {
  let mut body = String::new();

  body.push_str(&format!(
    "<h2>Original Image</h2>\n<img alt=\"original\" src=\"{}\">\n\
     <h2>Detection Results</h2>\n<img alt=\"detections\" src=\"{}\">\n",
    png_data_uri(&assessment.prepared)?,
    png_data_uri(&assessment.output.annotated)?
  ));

  let Some(severity) = assessment.output.severity.as_ref() else {
    body.push_str(&format!("<div class=\"info\">{}</div>", NO_DAMAGE_MESSAGE));
    return Ok(layout(&body));
  };

  body.push_str(
    "<h2>Detected Damages</h2>\n<table><tr><th>Damage Type</th><th>Confidence</th></tr>\n",
  );
  for row in detection_rows(&assessment.output.detections) {
    body.push_str(&format!(
      "<tr><td>{}</td><td>{}</td></tr>\n",
      escape_html(row.damage_type),
      row.confidence
    ));
  }
  body.push_str("</table>\n<h2>Damage Assessment</h2>\n<h3>Overall Assessment:</h3>\n<ul>\n");
  for line in assessment_lines(severity) {
    body.push_str(&format!("<li>{}</li>\n", escape_html(&line)));
  }
  body.push_str("</ul>");

  Ok(layout(&body))
}
