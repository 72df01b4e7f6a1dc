//! Response bodies shared by the integration tests

use serde_json::{Value, json};
use wiremock::ResponseTemplate;

/// Smallest useful JPEG prefix
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

/// MP4 file prefix with an `ftyp` box
pub fn mp4_bytes() -> Vec<u8> {
    let mut mp4 = vec![0, 0, 0, 0x18];
    mp4.extend_from_slice(b"ftypisom");
    mp4
}

/// A real 2x2 PNG
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// 200 response carrying `body` as `content_type`
pub fn media(body: Vec<u8>, content_type: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, content_type)
}

/// A link post child
pub fn link_post(id: &str, url: &str, author: &str) -> Value {
    json!({
        "kind": "t3",
        "data": { "id": id, "url": url, "title": format!("title {id}"), "author": author, "is_self": false }
    })
}

/// A listing page
pub fn listing(children: Vec<Value>, after: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "kind": "Listing",
        "data": { "children": children, "after": after }
    }))
}
