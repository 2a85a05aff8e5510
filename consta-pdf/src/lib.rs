//! Renders captured portal pages into a single PDF document.
//!
//! The certificate is evidence, so the document reproduces the portal's own
//! rendering instead of re-laying out extracted text: one page per screenshot,
//! in capture order, at the screenshot's native pixel size (one pixel maps to
//! one PDF point). Screenshots arrive as PNG bytes straight from the browser
//! session.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// No screenshots were captured. The caller must treat this as a failed
    /// transaction, never as an empty-but-successful document.
    #[error("no captured pages to render")]
    NoContent,
    /// A screenshot could not be decoded as PNG.
    #[error("screenshot {index} is not renderable: {message}")]
    BadScreenshot { index: usize, message: String },
    /// An already-rendered document could not be read back.
    #[error("failed to parse document: {0}")]
    Parse(String),
    /// The assembled document could not be serialized.
    #[error("failed to assemble document: {0}")]
    Assembly(String),
}

struct DecodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

/// Build one PDF from PNG screenshots, one page per image in input order.
///
/// Each page's MediaBox matches the image's pixel dimensions, so a 1280x4000
/// capture becomes a 1280x4000pt page and nothing is scaled or cropped.
pub fn render_document(screenshots: &[Vec<u8>]) -> Result<Vec<u8>, RenderError> {
    if screenshots.is_empty() {
        return Err(RenderError::NoContent);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut page_refs = Vec::with_capacity(screenshots.len());
    for (index, bytes) in screenshots.iter().enumerate() {
        let image = decode_png(index, bytes)?;
        let page_id = add_image_page(&mut doc, pages_id, &image)?;
        page_refs.push(Object::Reference(page_id));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
    pages_dict.set("Kids", Object::Array(page_refs));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog_dict));

    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Assembly(format!("failed to save document: {e}")))?;

    tracing::debug!(
        target: "pdf.render",
        pages = screenshots.len(),
        bytes = buffer.len(),
        "document assembled"
    );
    Ok(buffer)
}

/// Number of pages in a rendered document.
pub fn page_count(document: &[u8]) -> Result<usize, RenderError> {
    let doc = Document::load_mem(document).map_err(|e| RenderError::Parse(e.to_string()))?;
    Ok(doc.get_pages().len())
}

/// Per-page MediaBox dimensions, in page order.
pub fn page_dimensions(document: &[u8]) -> Result<Vec<(u32, u32)>, RenderError> {
    let doc = Document::load_mem(document).map_err(|e| RenderError::Parse(e.to_string()))?;
    let mut dimensions = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| RenderError::Parse(format!("unreadable page object: {e}")))?;
        let media_box = page
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .map_err(|e| RenderError::Parse(format!("page without MediaBox: {e}")))?;
        let corner = |i: usize| -> Result<u32, RenderError> {
            media_box
                .get(i)
                .and_then(|obj| obj.as_i64().ok())
                .map(|v| v as u32)
                .ok_or_else(|| RenderError::Parse("malformed MediaBox".to_string()))
        };
        dimensions.push((corner(2)?, corner(3)?));
    }
    Ok(dimensions)
}

fn decode_png(index: usize, bytes: &[u8]) -> Result<DecodedImage, RenderError> {
    let bad = |message: String| RenderError::BadScreenshot { index, message };

    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder.read_info().map_err(|e| bad(e.to_string()))?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(|e| bad(e.to_string()))?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(bad(format!("unsupported bit depth {:?}", info.bit_depth)));
    }

    // PDF image XObjects take raw DeviceRGB; alpha from browser captures is
    // always opaque and gets dropped.
    let rgb = match info.color_type {
        png::ColorType::Rgb => buf,
        png::ColorType::Rgba => buf.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g]).collect(),
        png::ColorType::GrayscaleAlpha => {
            buf.chunks_exact(2).flat_map(|px| [px[0], px[0], px[0]]).collect()
        }
        other => return Err(bad(format!("unsupported color type {other:?}"))),
    };

    Ok(DecodedImage { width: info.width, height: info.height, rgb })
}

fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    image: &DecodedImage,
) -> Result<ObjectId, RenderError> {
    let compression_failed = |e: std::io::Error| {
        RenderError::Assembly(format!("image compression failed: {e}"))
    };
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&image.rgb).map_err(compression_failed)?;
    let data = encoder.finish().map_err(compression_failed)?;

    let mut image_dict = Dictionary::new();
    image_dict.set("Type", Object::Name(b"XObject".to_vec()));
    image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    image_dict.set("Width", Object::Integer(image.width as i64));
    image_dict.set("Height", Object::Integer(image.height as i64));
    image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    image_dict.set("BitsPerComponent", Object::Integer(8));
    image_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    let image_id = doc.add_object(Object::Stream(Stream::new(image_dict, data)));

    // Paint the image across the whole page at native size.
    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ", image.width, image.height);
    let content_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        content.into_bytes(),
    )));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", Object::Name(b"Page".to_vec()));
    page_dict.set("Parent", Object::Reference(pages_id));
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set("Resources", Object::Dictionary(resources));
    page_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(image.width as i64),
            Object::Integer(image.height as i64),
        ]),
    );
    Ok(doc.add_object(Object::Dictionary(page_dict)))
}
