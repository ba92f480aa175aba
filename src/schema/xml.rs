//! Reader for the XML schema description document.
//!
//! ```xml
//! <pc:PointCloudSchema xmlns:pc="http://pointcloud.org/schemas/PC/1.1">
//!   <pc:dimension>
//!     <pc:position>1</pc:position>
//!     <pc:size>4</pc:size>
//!     <pc:name>X</pc:name>
//!     <pc:interpretation>int32_t</pc:interpretation>
//!     <pc:scale>0.01</pc:scale>
//!   </pc:dimension>
//!   <pc:metadata>
//!     <Metadata name="compression">dimensional</Metadata>
//!   </pc:metadata>
//! </pc:PointCloudSchema>
//! ```
//!
//! Elements are matched on their local name. Positions are 1-based in the
//! document and 0-based in the resulting schema. The declared `size` is ignored
//! in favor of the size implied by the interpretation.

use roxmltree::{Document, Node};

use super::{Dimension, Schema};
use crate::error::PointCloudError;
use crate::types::{Compression, Interpretation};

impl Schema {
    /// Parses a schema document and assigns it `pcid` and `srid`.
    ///
    /// Any failure yields `SchemaParseError`; a partially read schema is discarded.
    pub fn from_xml(xml: &str, pcid: u32, srid: u32) -> Result<Schema, PointCloudError> {
        // Tolerate leading garbage such as a byte order mark.
        let start = xml.find('<').ok_or_else(|| {
            PointCloudError::SchemaParseError("document contains no XML element".to_string())
        })?;
        let doc = Document::parse(&xml[start..])?;
        let root = doc.root_element();
        if root.tag_name().name() != "PointCloudSchema" {
            return Err(PointCloudError::SchemaParseError(format!(
                "unexpected root element \"{}\"",
                root.tag_name().name()
            )));
        }

        let dimension_nodes: Vec<Node> = element_children(root, "dimension").collect();
        let ndims = dimension_nodes.len();
        let mut schema = Schema::new(ndims).with_pcid(pcid).with_srid(srid);

        for node in dimension_nodes {
            let dim = parse_dimension(node)?;
            if dim.position >= ndims {
                return Err(PointCloudError::SchemaParseError(format!(
                    "schema dimension states position \"{}\", but number of XML dimensions is \"{}\"",
                    dim.position + 1,
                    ndims
                )));
            }
            if schema.dimension(dim.position).is_some() {
                return Err(PointCloudError::SchemaParseError(format!(
                    "schema dimension at position \"{}\" is declared twice",
                    dim.position + 1
                )));
            }
            schema.set_dimension(dim)?;
        }
        schema.check_xy();

        for metadata in element_children(root, "metadata") {
            for entry in element_children(metadata, "Metadata") {
                if entry.attribute("name") == Some("compression") {
                    schema.compression = Compression::from_metadata(entry.text().unwrap_or(""));
                }
            }
        }

        log::debug!(
            "parsed schema {} with {} dimensions, {} bytes per point, compression {}",
            pcid,
            ndims,
            schema.size(),
            schema.compression()
        );
        Ok(schema)
    }
}

fn element_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

fn parse_dimension(node: Node) -> Result<Dimension, PointCloudError> {
    let mut name: Option<String> = None;
    let mut description = String::new();
    let mut position: Option<usize> = None;
    let mut interpretation: Option<Interpretation> = None;
    let mut scale = 1.0;
    let mut offset = 0.0;
    let mut active = false;

    for child in node.children().filter(|c| c.is_element()) {
        let content = child.text().unwrap_or("").trim();
        match child.tag_name().name() {
            "name" => name = Some(content.to_string()),
            "description" => description = content.to_string(),
            "size" => {}
            "active" => active = parse_flag(content),
            "position" => {
                let one_based = parse_number::<usize>(content, "position")?;
                position = Some(one_based.checked_sub(1).ok_or_else(|| {
                    PointCloudError::SchemaParseError(
                        "dimension positions start at 1".to_string(),
                    )
                })?);
            }
            "interpretation" => interpretation = Some(Interpretation::from_token(content)?),
            "scale" => scale = parse_number::<f64>(content, "scale")?,
            "offset" => offset = parse_number::<f64>(content, "offset")?,
            "uuid" | "parent_uuid" => {}
            other => log::info!("unhandled schema type element \"{}\" encountered", other),
        }
    }

    let missing =
        |field: &str| PointCloudError::SchemaParseError(format!("dimension has no {}", field));
    let mut dim = Dimension::new(
        name.ok_or_else(|| missing("name"))?,
        position.ok_or_else(|| missing("position"))?,
        interpretation.ok_or_else(|| missing("interpretation"))?,
    )
    .with_description(description)
    .with_scale(scale)
    .with_offset(offset);
    dim.active = active;
    Ok(dim)
}

/// `true`/`false` or an integer. Anything unreadable is inactive rather than an error.
fn parse_flag(content: &str) -> bool {
    if content.eq_ignore_ascii_case("true") {
        return true;
    }
    content.parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

fn parse_number<T: std::str::FromStr>(content: &str, field: &str) -> Result<T, PointCloudError> {
    content.parse::<T>().map_err(|_| {
        PointCloudError::SchemaParseError(format!("invalid {} value \"{}\"", field, content))
    })
}
