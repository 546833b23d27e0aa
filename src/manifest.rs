//! FormList document rendering
//!
//! Renders the ordered form metadata as an OpenRosa FormList document:
//! an `xforms` root in the `xformsList` namespace with one `xform` element
//! per form. Output is indented with two spaces and has no trailing newline.
//! Text escapes only `&`, `<` and `>`; quotes are written as-is.

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{FormListError, Result};
use crate::parser::{FieldOrder, FormMetadata};

pub const FORM_LIST_NAMESPACE: &str = "http://openrosa.org/xforms/xformsList";

fn render_error(error: impl std::fmt::Display) -> FormListError {
    FormListError::Render(error.to_string())
}

fn write_field(writer: &mut Writer<Vec<u8>>, tag: &str, value: &str) -> Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::from_escaped(partial_escape(value)))
        .map_err(render_error)?;
    Ok(())
}

fn write_identity(writer: &mut Writer<Vec<u8>>, form: &FormMetadata) -> Result<()> {
    write_field(writer, "formId", &form.form_id)?;
    if let Some(version) = &form.version {
        write_field(writer, "version", version)?;
    }
    Ok(())
}

fn write_form(writer: &mut Writer<Vec<u8>>, form: &FormMetadata) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("xform")))
        .map_err(render_error)?;

    match form.field_order {
        FieldOrder::NameFirst => {
            write_field(writer, "name", &form.name)?;
            write_identity(writer, form)?;
        }
        FieldOrder::FormIdFirst => {
            write_identity(writer, form)?;
            write_field(writer, "name", &form.name)?;
        }
    }
    write_field(writer, "hash", &form.hash)?;
    if let Some(download_url) = &form.download_url {
        write_field(writer, "downloadUrl", download_url)?;
    }
    if let Some(manifest_url) = &form.manifest_url {
        write_field(writer, "manifestUrl", manifest_url)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("xform")))
        .map_err(render_error)?;
    Ok(())
}

/// Render the form list document for `forms`, preserving their order.
pub fn render_manifest(forms: &[FormMetadata]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(render_error)?;

    let root = BytesStart::new("xforms").with_attributes([("xmlns", FORM_LIST_NAMESPACE)]);
    if forms.is_empty() {
        writer
            .write_event(Event::Empty(root))
            .map_err(render_error)?;
    } else {
        writer
            .write_event(Event::Start(root))
            .map_err(render_error)?;
        for form in forms {
            write_form(&mut writer, form)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("xforms")))
            .map_err(render_error)?;
    }

    String::from_utf8(writer.into_inner()).map_err(render_error)
}
