//! DOCX renderer
//!
//! Writes a minimal Office Open XML word-processing package: content types,
//! relationships, a style sheet, the document body and (optionally) one
//! embedded picture.

use crate::error::{ProbeError, RenderError};
use crate::image::{probe_image, resolve_image_path, ImageInfo, ProbeLimits};
use crate::{resolve_output_path, ConflictPolicy, DocumentRenderer, IMAGE_NOT_FOUND};
use arboreto_record::TreeRecord;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const EMU_PER_INCH: f64 = 914_400.0;
const DEFAULT_IMAGE_WIDTH_INCHES: f64 = 3.5;
const IMAGE_REL_ID: &str = "rIdImage1";

const CONTENT_TYPES_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#;

const CONTENT_TYPES_TAIL: &str = r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri"/><w:sz w:val="22"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="240"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:color w:val="2E5E1E"/><w:sz w:val="32"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Caption"><w:name w:val="caption"/><w:basedOn w:val="Normal"/><w:rPr><w:i/><w:color w:val="595959"/><w:sz w:val="18"/></w:rPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#;

/// Renders records as `.docx` documents.
#[derive(Debug, Clone)]
pub struct DocxRenderer {
    policy: ConflictPolicy,
    limits: ProbeLimits,
    image_width_inches: f64,
}

impl DocxRenderer {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            limits: ProbeLimits::default(),
            image_width_inches: DEFAULT_IMAGE_WIDTH_INCHES,
        }
    }

    fn load_image(&self, record: &TreeRecord, image_root: &Path) -> Result<ImageInfo, ProbeError> {
        let declared = record.imagen.as_deref().unwrap_or_default();
        let path = resolve_image_path(image_root, declared)?;
        probe_image(&path, &self.limits)
    }
}

impl Default for DocxRenderer {
    fn default() -> Self {
        Self::new(ConflictPolicy::default())
    }
}

impl DocumentRenderer for DocxRenderer {
    fn extension(&self) -> &str {
        "docx"
    }

    fn render(
        &self,
        record: &TreeRecord,
        image_root: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let target = resolve_output_path(
            output_dir,
            &record.output_stem(),
            self.extension(),
            self.policy,
        )?;

        let image = match self.load_image(record, image_root) {
            Ok(info) => Some(info),
            Err(err) => {
                if record.imagen.is_some() {
                    warn!(id = %record.id, reason = %err, "Image not embedded, using placeholder");
                }
                None
            }
        };

        let document = document_xml(record, image.as_ref(), self.image_width_inches);
        write_package(&target, &document, image.as_ref())?;

        info!(path = %target.display(), "Document generated");
        Ok(target)
    }
}

/// Body of `word/document.xml`, built paragraph by paragraph.
struct Body {
    xml: String,
}

impl Body {
    fn new() -> Self {
        Self { xml: String::new() }
    }

    fn styled(&mut self, style: Option<&str>, text: &str) {
        self.xml.push_str("<w:p>");
        if let Some(style) = style {
            self.xml
                .push_str(&format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, style));
        }
        self.xml.push_str(&run(text));
        self.xml.push_str("</w:p>");
    }

    fn heading(&mut self, text: &str) {
        self.styled(Some("Heading1"), text);
    }

    fn paragraph(&mut self, text: &str) {
        self.styled(None, text);
    }

    fn caption(&mut self, text: &str) {
        self.styled(Some("Caption"), text);
    }

    fn picture(&mut self, image: &ImageInfo, width_inches: f64) {
        let cx = (width_inches * EMU_PER_INCH).round() as u64;
        let cy = cx * u64::from(image.height) / u64::from(image.width.max(1));
        let name = format!("image1.{}", image.format.extension());
        self.xml.push_str(&format!(
            concat!(
                r#"<w:p><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="1" name="Picture 1"/>"#,
                r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
                r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
                r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
            ),
            cx = cx,
            cy = cy,
            name = name,
            rel = IMAGE_REL_ID,
        ));
    }

    fn table(&mut self, rows: &[(String, String)]) {
        self.xml.push_str(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid><w:gridCol w:w="3000"/><w:gridCol w:w="6000"/></w:tblGrid>"#,
        );
        let header = ("Atributo".to_string(), "Valor".to_string());
        for (attr, value) in std::iter::once(&header).chain(rows.iter()) {
            self.xml.push_str("<w:tr>");
            for cell in [attr, value] {
                self.xml.push_str("<w:tc><w:p>");
                self.xml.push_str(&run(cell));
                self.xml.push_str("</w:p></w:tc>");
            }
            self.xml.push_str("</w:tr>");
        }
        self.xml.push_str("</w:tbl>");
    }

    fn finish(self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
                "<w:body>{}",
                r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#,
                "</w:body></w:document>"
            ),
            self.xml
        )
    }
}

fn run(text: &str) -> String {
    format!(
        r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#,
        xml_escape(text)
    )
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0 forbids most control characters
            c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// Details table rows: the known optional fields first, then the extended
/// table in record order.
fn detail_rows(record: &TreeRecord) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if let Some(especie) = &record.especie {
        rows.push(("Especie".to_string(), especie.clone()));
    }
    if let Some(altura) = record.altura_metros {
        rows.push(("Altura (m)".to_string(), altura.to_string()));
    }
    if let Some(edad) = &record.edad_aproximada {
        rows.push(("Edad aproximada".to_string(), edad.clone()));
    }
    if let Some(salud) = &record.estado_salud {
        rows.push(("Estado de salud".to_string(), salud.clone()));
    }
    for row in &record.tabla_extendida {
        rows.push((row.atributo.clone(), row.valor.clone()));
    }
    rows
}

fn document_xml(record: &TreeRecord, image: Option<&ImageInfo>, width_inches: f64) -> String {
    let mut body = Body::new();
    body.heading(&format!("Reporte del Árbol: {}", record.nombre));
    body.paragraph(&format!("📝 Descripción: {}", record.descripcion));
    if let Some(ubicacion) = &record.ubicacion {
        body.paragraph(&format!("📍 Ubicación: {}", ubicacion));
    }
    body.paragraph(&format!("📅 Fecha: {}", record.fecha_text()));

    match image {
        Some(info) => body.picture(info, width_inches),
        None => body.paragraph(IMAGE_NOT_FOUND),
    }
    if let Some(caption) = &record.pie_imagen {
        body.caption(caption);
    }

    if record.has_details() {
        body.table(&detail_rows(record));
        if let Some(caption) = &record.pie_tabla {
            body.caption(caption);
        }
    }

    body.finish()
}

fn content_types(image: Option<&ImageInfo>) -> String {
    let mut xml = CONTENT_TYPES_HEAD.to_string();
    if let Some(info) = image {
        xml.push_str(&format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            info.format.extension(),
            info.format.content_type()
        ));
    }
    xml.push_str(CONTENT_TYPES_TAIL);
    xml
}

fn document_rels(image: Option<&ImageInfo>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    );
    if let Some(info) = image {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.{}"/>"#,
            IMAGE_REL_ID,
            info.format.extension()
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// Write the package to a hidden sibling, then rename it over `target`.
///
/// A failed render never leaves a half-written document under the final name.
fn write_package(
    target: &Path,
    document: &str,
    image: Option<&ImageInfo>,
) -> Result<(), RenderError> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.docx".to_string());
    let partial = target.with_file_name(format!(".{}.partial", file_name));

    let result = write_zip(&partial, document, image)
        .and_then(|()| fs::rename(&partial, target).map_err(|e| RenderError::io(target, e)));
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn write_zip(path: &Path, document: &str, image: Option<&ImageInfo>) -> Result<(), RenderError> {
    let file = File::create(path).map_err(|e| RenderError::io(path, e))?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut parts: Vec<(String, &[u8])> = Vec::new();
    let types = content_types(image);
    let rels = document_rels(image);
    parts.push(("[Content_Types].xml".to_string(), types.as_bytes()));
    parts.push(("_rels/.rels".to_string(), PACKAGE_RELS.as_bytes()));
    parts.push(("word/_rels/document.xml.rels".to_string(), rels.as_bytes()));
    parts.push(("word/styles.xml".to_string(), STYLES.as_bytes()));
    parts.push(("word/document.xml".to_string(), document.as_bytes()));
    if let Some(info) = image {
        parts.push((
            format!("word/media/image1.{}", info.format.extension()),
            info.bytes.as_slice(),
        ));
    }

    for (name, bytes) in parts {
        zip.start_file(name, options)?;
        zip.write_all(bytes).map_err(|e| RenderError::io(path, e))?;
    }

    let file = zip.finish()?;
    file.sync_all().map_err(|e| RenderError::io(path, e))?;
    Ok(())
}
