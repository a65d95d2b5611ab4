//! Single-pass streaming parser for NodeSet2 documents.

use std::{fs::File, io::Read, path::Path};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::{
    encoding::{ElementEvent, ElementStart, XmlReadError, XmlStreamReader},
    error::{XmlError, XmlErrorInner},
    node_id::ParsedNodeId,
};

use super::{
    document::{ModelInfo, ParsedDocument, BASE_NAMESPACE_URI},
    node::{
        Argument, DataTypeField, DataTypeInfo, NodeClass, NodeKind, Reference, UaNode,
        VariableAttributes,
    },
};

/// Default field type when a structure field omits `DataType`.
const BASE_DATA_TYPE: &str = "i=24";

/// Open and parse the NodeSet2 file at `path`.
pub fn load_nodeset2_file(path: impl AsRef<Path>) -> Result<ParsedDocument, XmlError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| XmlError::io(format!("Failed to open {}", path.display()), e))?;
    let document = parse_nodeset2(file)?;
    info!(
        "Loaded nodeset {} with {} nodes",
        document.namespace_uri,
        document.nodes.len()
    );
    Ok(document)
}

/// Parse a NodeSet2 document held in memory.
pub fn parse_nodeset2_str(data: &str) -> Result<ParsedDocument, XmlError> {
    parse_nodeset2(data.as_bytes())
}

/// Parse a NodeSet2 document from any reader, in a single forward pass.
pub fn parse_nodeset2<T: Read>(input: T) -> Result<ParsedDocument, XmlError> {
    let mut parser = NodeSetParser {
        reader: XmlStreamReader::new(input),
        document: ParsedDocument::default(),
        namespace_uris: Vec::new(),
        next_required_index: 2,
    };
    parser.parse_document()?;
    Ok(parser.document)
}

struct NodeSetParser<T> {
    reader: XmlStreamReader<T>,
    document: ParsedDocument,
    /// Entries of the `NamespaceUris` table, used when `Models` is absent.
    namespace_uris: Vec<String>,
    next_required_index: u16,
}

impl<T: Read> NodeSetParser<T> {
    fn error(&self, error: impl Into<XmlErrorInner>) -> XmlError {
        XmlError::new(self.reader.position(), error)
    }

    fn next(&mut self) -> Result<ElementEvent, XmlError> {
        let res = self.reader.next_element();
        res.map_err(|e| self.error(e))
    }

    fn skip(&mut self) -> Result<(), XmlError> {
        let res = self.reader.skip_value();
        res.map_err(|e| self.error(e))
    }

    fn text(&mut self, empty: bool) -> Result<String, XmlError> {
        if empty {
            return Ok(String::new());
        }
        let res = self.reader.consume_as_text();
        res.map_err(|e| self.error(e))
    }

    /// Visit each child element of the current element, up to and including
    /// its end tag. The visitor must consume any child it is handed that is
    /// not empty.
    fn children(
        &mut self,
        mut visit: impl FnMut(&mut Self, ElementStart, bool) -> Result<(), XmlError>,
    ) -> Result<(), XmlError> {
        loop {
            match self.next()? {
                ElementEvent::Start(s) => visit(self, s, false)?,
                ElementEvent::Empty(s) => visit(self, s, true)?,
                ElementEvent::End => return Ok(()),
                ElementEvent::Eof => return Err(self.error(XmlReadError::UnexpectedEof)),
            }
        }
    }

    fn require_attribute(&self, start: &ElementStart, name: &str) -> Result<String, XmlError> {
        start
            .attribute(name)
            .map(|s| s.to_owned())
            .ok_or_else(|| XmlError::missing_attribute(self.reader.position(), &start.name, name))
    }

    fn int_attribute<N: std::str::FromStr>(
        &self,
        start: &ElementStart,
        name: &str,
        default: N,
    ) -> Result<N, XmlError> {
        match start.attribute(name) {
            Some(v) => v.trim().parse().map_err(|_| {
                self.error(XmlReadError::Parse(format!(
                    "{name}=\"{v}\" on {} is not an integer",
                    start.name
                )))
            }),
            None => Ok(default),
        }
    }

    fn bool_attribute(&self, start: &ElementStart, name: &str, default: bool) -> Result<bool, XmlError> {
        match start.attribute(name).map(|v| v.trim()) {
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            Some(v) => Err(self.error(XmlReadError::Parse(format!(
                "{name}=\"{v}\" on {} is not a boolean",
                start.name
            )))),
            None => Ok(default),
        }
    }

    fn parse_document(&mut self) -> Result<(), XmlError> {
        loop {
            match self.next()? {
                ElementEvent::Start(s) if s.name == "UANodeSet" => self.parse_node_set()?,
                ElementEvent::Start(_) => self.skip()?,
                ElementEvent::Empty(_) | ElementEvent::End => {}
                ElementEvent::Eof => break,
            }
        }
        if self.document.namespace_uri.is_empty() {
            self.adopt_namespace_uris();
        }
        if self.document.namespace_uri.is_empty() {
            return Err(self.error(XmlErrorInner::MissingModel));
        }
        Ok(())
    }

    fn parse_node_set(&mut self) -> Result<(), XmlError> {
        self.children(|p, start, empty| {
            if let Some(class) = NodeClass::from_element(&start.name) {
                return p.parse_node(class, start, empty);
            }
            if empty {
                return Ok(());
            }
            match start.name.as_str() {
                "NamespaceUris" => p.parse_namespace_uris(),
                "Models" => p.parse_models(),
                "Aliases" => p.parse_aliases(),
                _ => p.skip(),
            }
        })
    }

    fn parse_namespace_uris(&mut self) -> Result<(), XmlError> {
        self.children(|p, start, empty| {
            if start.name == "Uri" {
                let uri = p.text(empty)?;
                p.namespace_uris.push(uri);
                Ok(())
            } else if empty {
                Ok(())
            } else {
                p.skip()
            }
        })
    }

    /// Without a model table the first `NamespaceUris` entry is this document's
    /// namespace and the rest keep their positions as indices.
    fn adopt_namespace_uris(&mut self) {
        let Some(uri) = self.namespace_uris.first().cloned() else {
            return;
        };
        warn!("Nodeset has no model table, using namespace {uri} from NamespaceUris");
        self.set_own_namespace(ModelInfo {
            uri,
            ..Default::default()
        });
        for (position, other) in self.namespace_uris.iter().enumerate().skip(1) {
            let Ok(index) = u16::try_from(position + 1) else {
                warn!("Namespace {other} is past the last namespace index");
                break;
            };
            self.document
                .namespace_index_map
                .entry(index)
                .or_insert_with(|| other.clone());
        }
    }

    fn set_own_namespace(&mut self, model: ModelInfo) {
        let index = if model.uri == BASE_NAMESPACE_URI { 0 } else { 1 };
        self.document
            .namespace_index_map
            .insert(index, model.uri.clone());
        self.document.namespace_uri = model.uri.clone();
        self.document.model = Some(model);
    }

    fn model_info(&self, start: &ElementStart) -> Result<ModelInfo, XmlError> {
        let uri = self.require_attribute(start, "ModelUri")?;
        let publication_date = start.attribute("PublicationDate").and_then(|d| {
            match DateTime::parse_from_rfc3339(d.trim()) {
                Ok(date) => Some(date.with_timezone(&Utc)),
                Err(e) => {
                    warn!("Invalid publication date {d} for model {uri}: {e}");
                    None
                }
            }
        });
        Ok(ModelInfo {
            uri,
            version: start.attribute("Version").map(|v| v.to_owned()),
            publication_date,
        })
    }

    fn parse_models(&mut self) -> Result<(), XmlError> {
        self.children(|p, start, empty| {
            if start.name != "Model" {
                return if empty { Ok(()) } else { p.skip() };
            }
            if p.document.model.is_some() {
                warn!("Multiple models found in nodeset file, only the first will be used.");
                return if empty { Ok(()) } else { p.skip() };
            }
            let model = p.model_info(&start)?;
            p.set_own_namespace(model);
            if empty {
                return Ok(());
            }
            p.children(|p, start, empty| {
                if start.name == "RequiredModel" {
                    let required = p.model_info(&start)?;
                    p.add_required_model(required);
                }
                if empty {
                    Ok(())
                } else {
                    p.skip()
                }
            })
        })
    }

    fn add_required_model(&mut self, model: ModelInfo) {
        if model.uri != BASE_NAMESPACE_URI {
            let index = self.next_required_index;
            self.next_required_index += 1;
            self.document
                .namespace_index_map
                .insert(index, model.uri.clone());
        }
        self.document.required_models.push(model);
    }

    fn parse_aliases(&mut self) -> Result<(), XmlError> {
        self.children(|p, start, empty| {
            if start.name != "Alias" {
                return if empty { Ok(()) } else { p.skip() };
            }
            let alias = p.require_attribute(&start, "Alias")?;
            let id = p.text(empty)?;
            p.document.alias_map.insert(alias, id);
            Ok(())
        })
    }

    fn parse_node(
        &mut self,
        class: NodeClass,
        start: ElementStart,
        empty: bool,
    ) -> Result<(), XmlError> {
        if self.document.namespace_uri.is_empty() {
            self.adopt_namespace_uris();
        }
        let node_id = self.require_attribute(&start, "NodeId")?;
        let parsed = ParsedNodeId::parse(&node_id).map_err(|e| self.error(e))?;

        let mut node = UaNode::new(
            class,
            node_id,
            parsed.value,
            self.document.namespace_uri.clone(),
        );
        node.browse_name = start.attribute("BrowseName").unwrap_or_default().to_owned();
        node.parent_node_id = start
            .attribute("ParentNodeId")
            .unwrap_or_default()
            .to_owned();

        match &mut node.kind {
            NodeKind::Variable(attributes) => {
                self.read_variable_attributes(&start, attributes)?;
            }
            NodeKind::VariableType {
                attributes,
                is_abstract,
            } => {
                self.read_variable_attributes(&start, attributes)?;
                *is_abstract = self.bool_attribute(&start, "IsAbstract", false)?;
            }
            NodeKind::ObjectType { is_abstract } => {
                *is_abstract = self.bool_attribute(&start, "IsAbstract", false)?;
            }
            NodeKind::DataType(info) => {
                info.node_id = node.node_id.clone();
                info.namespace_uri = node.namespace_uri.clone();
                info.definition_name = node.browse_name.clone();
                self.document.has_custom_types = true;
            }
            NodeKind::Object | NodeKind::Method(_) => {}
        }

        if !empty {
            self.children(|p, start, empty| p.parse_node_child(&mut node, start, empty))?;
        }

        if let NodeKind::DataType(info) = &mut node.kind {
            if info.definition_name == "LocalizedText"
                && info.namespace_uri == BASE_NAMESPACE_URI
                && info.fields.is_empty()
            {
                info.fields.push(DataTypeField {
                    name: "Locale".to_owned(),
                    data_type: "Locale".to_owned(),
                    value: None,
                });
                info.fields.push(DataTypeField {
                    name: "Text".to_owned(),
                    data_type: "String".to_owned(),
                    value: None,
                });
            }
        }

        debug!("Parsed {} {} ({})", class, node.node_id, node.browse_name);
        let identifier = node.identifier.clone();
        if let Some(previous) = self.document.nodes.insert(identifier, node) {
            warn!(
                "Duplicate node id {} in nodeset {}, replacing earlier definition",
                previous.node_id, self.document.namespace_uri
            );
        }
        Ok(())
    }

    fn read_variable_attributes(
        &self,
        start: &ElementStart,
        attributes: &mut VariableAttributes,
    ) -> Result<(), XmlError> {
        attributes.data_type =
            DataTypeInfo::placeholder(start.attribute("DataType").unwrap_or_default());
        attributes.value_rank = self.int_attribute(start, "ValueRank", -1)?;
        if let Some(dims) = start.attribute("ArrayDimensions") {
            let mut parsed = Vec::new();
            for dim in dims.split(',').map(|d| d.trim()).filter(|d| !d.is_empty()) {
                let dim = dim.parse::<u32>().map_err(|e| self.error(XmlReadError::from(e)))?;
                parsed.push(dim);
            }
            attributes.array_dimensions = parsed;
        }
        Ok(())
    }

    fn parse_node_child(
        &mut self,
        node: &mut UaNode,
        start: ElementStart,
        empty: bool,
    ) -> Result<(), XmlError> {
        match start.name.as_str() {
            "DisplayName" => {
                let text = self.text(empty)?;
                if node.display_name.is_empty() {
                    node.display_name = text;
                }
            }
            "Description" => {
                let text = self.text(empty)?;
                if node.description.is_empty() {
                    node.description = text;
                }
            }
            "References" if !empty => {
                self.children(|p, start, empty| {
                    if start.name == "Reference" {
                        let reference = p.parse_reference(&start, empty)?;
                        node.references.push(reference);
                        Ok(())
                    } else if empty {
                        Ok(())
                    } else {
                        p.skip()
                    }
                })?;
            }
            "Definition" => {
                if let NodeKind::DataType(info) = &mut node.kind {
                    if let Some(name) = start.attribute("Name") {
                        info.definition_name = name.to_owned();
                    }
                    if !empty {
                        self.parse_definition(info)?;
                    }
                } else if !empty {
                    self.skip()?;
                }
            }
            "Value" if !empty => {
                if let NodeKind::Variable(attributes) = &mut node.kind {
                    self.parse_value(&mut attributes.arguments)?;
                } else {
                    self.skip()?;
                }
            }
            _ if !empty => self.skip()?,
            _ => {}
        }
        Ok(())
    }

    fn parse_reference(&mut self, start: &ElementStart, empty: bool) -> Result<Reference, XmlError> {
        let reference_type = self.require_attribute(start, "ReferenceType")?;
        let is_forward = self.bool_attribute(start, "IsForward", true)?;
        let target_node_id = self.text(empty)?;

        let namespace_uri = match ParsedNodeId::parse(&target_node_id) {
            Ok(target) => {
                let uri = self.document.namespace_for_index(target.namespace);
                if uri.is_none() {
                    warn!(
                        "No namespace for index {} of reference target {} in {}",
                        target.namespace, target_node_id, self.document.namespace_uri
                    );
                }
                uri.map(|u| u.to_owned())
            }
            Err(e) => {
                warn!("Reference in {}: {e}", self.document.namespace_uri);
                None
            }
        };

        Ok(Reference {
            reference_type,
            target_node_id,
            is_forward,
            namespace_uri,
            target: None,
        })
    }

    fn parse_definition(&mut self, info: &mut DataTypeInfo) -> Result<(), XmlError> {
        self.children(|p, start, empty| {
            if start.name != "Field" {
                return if empty { Ok(()) } else { p.skip() };
            }
            let name = p.require_attribute(&start, "Name")?;
            let value = match start.attribute("Value") {
                Some(_) => Some(p.int_attribute::<i64>(&start, "Value", 0)?),
                None => None,
            };
            let data_type = match value {
                Some(_) => start.attribute("DataType").unwrap_or_default().to_owned(),
                None => start.attribute("DataType").unwrap_or(BASE_DATA_TYPE).to_owned(),
            };
            if value.is_some() {
                info.is_enum = true;
            }
            info.fields.push(DataTypeField {
                name,
                data_type,
                value,
            });
            if empty {
                Ok(())
            } else {
                p.skip()
            }
        })
    }

    /// Read the `ListOfExtensionObject` of argument descriptions in a variable value.
    fn parse_value(&mut self, arguments: &mut Vec<Argument>) -> Result<(), XmlError> {
        self.children(|p, start, empty| {
            if empty {
                return Ok(());
            }
            if start.name != "ListOfExtensionObject" {
                return p.skip();
            }
            p.children(|p, start, empty| {
                if empty {
                    return Ok(());
                }
                if start.name != "ExtensionObject" {
                    return p.skip();
                }
                let mut argument = Argument {
                    name: String::new(),
                    data_type: String::new(),
                    value_rank: -1,
                };
                p.children(|p, start, empty| match start.name.as_str() {
                    "Body" if !empty => p.parse_argument_fields(&mut argument),
                    _ if !empty => p.skip(),
                    _ => Ok(()),
                })?;
                if argument.name.is_empty() {
                    debug!("Skipping extension object without argument name");
                } else {
                    arguments.push(argument);
                }
                Ok(())
            })
        })
    }

    /// Fields may sit directly in `Body` or inside a nested `Argument` element.
    fn parse_argument_fields(&mut self, argument: &mut Argument) -> Result<(), XmlError> {
        self.children(|p, start, empty| {
            match start.name.as_str() {
                "Argument" if !empty => p.parse_argument_fields(argument)?,
                "Name" => argument.name = p.text(empty)?,
                "ValueRank" => {
                    let text = p.text(empty)?;
                    argument.value_rank = text
                        .parse()
                        .map_err(|e| p.error(XmlReadError::from(e)))?;
                }
                "DataType" if !empty => {
                    p.children(|p, start, empty| {
                        if start.name == "Identifier" {
                            argument.data_type = p.text(empty)?;
                            Ok(())
                        } else if empty {
                            Ok(())
                        } else {
                            p.skip()
                        }
                    })?;
                }
                _ if !empty => p.skip()?,
                _ => {}
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        node_id::NodeIdVariant,
        schema::node::{NodeClass, NodeKind},
    };

    use super::*;

    const PUMP: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<UANodeSet xmlns="http://opcfoundation.org/UA/2011/03/UANodeSet.xsd" xmlns:uax="http://opcfoundation.org/UA/2008/02/Types.xsd">
  <NamespaceUris>
    <Uri>http://example.org/UA/Pump/</Uri>
    <Uri>http://example.org/UA/Motor/</Uri>
  </NamespaceUris>
  <Models>
    <Model ModelUri="http://example.org/UA/Pump/" Version="1.0.0" PublicationDate="2024-03-01T00:00:00Z">
      <RequiredModel ModelUri="http://opcfoundation.org/UA/" Version="1.05.03" />
      <RequiredModel ModelUri="http://example.org/UA/Motor/" Version="1.0.0" />
    </Model>
  </Models>
  <Aliases>
    <Alias Alias="Double">i=11</Alias>
    <Alias Alias="HasComponent">i=47</Alias>
    <Alias Alias="HasSubtype">i=45</Alias>
  </Aliases>
  <UAObjectType NodeId="ns=1;i=1001" BrowseName="1:PumpType">
    <DisplayName>PumpType</DisplayName>
    <Description>A pump &amp; its drive</Description>
    <References>
      <Reference ReferenceType="HasSubtype" IsForward="false">ns=2;i=1101</Reference>
      <Reference ReferenceType="HasComponent">ns=1;i=6001</Reference>
      <Reference ReferenceType="HasComponent">ns=9;i=1</Reference>
    </References>
  </UAObjectType>
  <UAVariable NodeId="ns=1;i=6001" BrowseName="1:Speed" ParentNodeId="ns=1;i=1001" DataType="Double" ArrayDimensions="2,3" ValueRank="2">
    <DisplayName>Speed</DisplayName>
    <References>
      <Reference ReferenceType="HasComponent" IsForward="false">ns=1;i=1001</Reference>
    </References>
  </UAVariable>
  <UADataType NodeId="ns=1;i=3001" BrowseName="1:PumpMode">
    <DisplayName>PumpMode</DisplayName>
    <Definition Name="1:PumpMode">
      <Field Name="Off" Value="0" />
      <Field Name="Manual" Value="1"><Description>Hand</Description></Field>
    </Definition>
  </UADataType>
  <UADataType NodeId="ns=1;i=3002" BrowseName="1:PumpStatus">
    <Definition Name="1:PumpStatusStruct">
      <Field Name="Flow" DataType="Double" />
      <Field Name="Tag" />
    </Definition>
  </UADataType>
  <UAVariable NodeId="ns=1;i=6010" BrowseName="InputArguments" DataType="i=296" ValueRank="1">
    <DisplayName>InputArguments</DisplayName>
    <Value>
      <uax:ListOfExtensionObject>
        <uax:ExtensionObject>
          <uax:TypeId><uax:Identifier>i=297</uax:Identifier></uax:TypeId>
          <uax:Body>
            <uax:Argument>
              <uax:Name>Setpoint</uax:Name>
              <uax:DataType><uax:Identifier>i=11</uax:Identifier></uax:DataType>
              <uax:ValueRank>-1</uax:ValueRank>
              <uax:ArrayDimensions />
              <uax:Description><uax:Text>Target speed</uax:Text></uax:Description>
            </uax:Argument>
          </uax:Body>
        </uax:ExtensionObject>
        <uax:ExtensionObject>
          <uax:TypeId><uax:Identifier>i=297</uax:Identifier></uax:TypeId>
          <uax:Body>
            <uax:Name>Mode</uax:Name>
            <uax:DataType><uax:Identifier>ns=1;i=3001</uax:Identifier></uax:DataType>
          </uax:Body>
        </uax:ExtensionObject>
      </uax:ListOfExtensionObject>
    </Value>
  </UAVariable>
  <UAObject NodeId="ns=1;i=5001" BrowseName="1:Pumps" />
</UANodeSet>"#;

    #[test]
    fn parse_models_and_namespaces() {
        let doc = parse_nodeset2_str(PUMP).unwrap();
        assert_eq!(doc.namespace_uri, "http://example.org/UA/Pump/");
        assert_eq!(doc.namespace_for_index(0), Some(BASE_NAMESPACE_URI));
        assert_eq!(doc.namespace_for_index(1), Some("http://example.org/UA/Pump/"));
        assert_eq!(doc.namespace_for_index(2), Some("http://example.org/UA/Motor/"));
        assert_eq!(doc.namespace_index_map.len(), 3);
        assert_eq!(
            doc.required_model_uris().collect::<Vec<_>>(),
            vec![BASE_NAMESPACE_URI, "http://example.org/UA/Motor/"]
        );
        let model = doc.model.as_ref().unwrap();
        assert_eq!(model.version.as_deref(), Some("1.0.0"));
        assert!(model.publication_date.is_some());
        assert_eq!(doc.resolve_alias("HasComponent"), "i=47");
        assert_eq!(doc.resolve_alias("i=46"), "i=46");
        assert_eq!(doc.alias_for("i=11"), Some("Double"));
        assert!(doc.has_custom_types);
    }

    #[test]
    fn parse_node_attributes_and_references() {
        let doc = parse_nodeset2_str(PUMP).unwrap();
        let pump = doc.node(&NodeIdVariant::Numeric(1001)).unwrap();
        assert_eq!(pump.class(), NodeClass::ObjectType);
        assert_eq!(pump.browse_name, "1:PumpType");
        assert_eq!(pump.display_name, "PumpType");
        assert_eq!(pump.description, "A pump & its drive");
        assert_eq!(pump.is_abstract(), Ok(false));
        assert_eq!(pump.references.len(), 3);

        let subtype = &pump.references[0];
        assert!(!subtype.is_forward);
        assert_eq!(subtype.namespace_uri.as_deref(), Some("http://example.org/UA/Motor/"));
        assert!(pump.references[1].is_forward);
        assert_eq!(
            pump.references[1].namespace_uri.as_deref(),
            Some("http://example.org/UA/Pump/")
        );
        // Unmapped namespace index leaves the namespace empty.
        assert_eq!(pump.references[2].namespace_uri, None);

        let speed = doc.find_node("ns=1;i=6001").unwrap();
        assert_eq!(speed.parent_node_id, "ns=1;i=1001");
        let attributes = speed.variable().unwrap();
        assert_eq!(attributes.data_type.definition_name, "Double");
        assert!(!attributes.data_type.is_resolved());
        assert_eq!(attributes.array_dimensions, vec![2, 3]);
        assert_eq!(attributes.value_rank, 2);

        let folder = doc.node(&NodeIdVariant::Numeric(5001)).unwrap();
        assert_eq!(folder.class(), NodeClass::Object);
        assert!(folder.references.is_empty());
    }

    #[test]
    fn parse_data_type_definitions() {
        let doc = parse_nodeset2_str(PUMP).unwrap();
        let mode = doc.node(&NodeIdVariant::Numeric(3001)).unwrap();
        let NodeKind::DataType(info) = &mode.kind else {
            panic!("Expected data type");
        };
        assert!(info.is_enum);
        assert_eq!(info.definition_name, "1:PumpMode");
        assert_eq!(info.node_id, "ns=1;i=3001");
        assert_eq!(info.fields.len(), 2);
        assert_eq!(info.field("Manual").unwrap().value, Some(1));

        let status = doc.node(&NodeIdVariant::Numeric(3002)).unwrap();
        let info = status.data_type().unwrap();
        assert!(!info.is_enum);
        assert_eq!(info.definition_name, "1:PumpStatusStruct");
        assert_eq!(info.field("Flow").unwrap().data_type, "Double");
        assert_eq!(info.field("Tag").unwrap().data_type, "i=24");
    }

    #[test]
    fn parse_argument_list() {
        let doc = parse_nodeset2_str(PUMP).unwrap();
        let args = doc.find_node("ns=1;i=6010").unwrap().arguments().unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].name, "Setpoint");
        assert_eq!(args[0].data_type, "i=11");
        assert_eq!(args[0].value_rank, -1);
        assert_eq!(args[1].name, "Mode");
        assert_eq!(args[1].data_type, "ns=1;i=3001");
    }

    #[test]
    fn localized_text_gets_synthetic_fields() {
        let xml = r#"<UANodeSet>
  <Models><Model ModelUri="http://opcfoundation.org/UA/" /></Models>
  <UADataType NodeId="i=21" BrowseName="LocalizedText"><DisplayName>LocalizedText</DisplayName></UADataType>
</UANodeSet>"#;
        let doc = parse_nodeset2_str(xml).unwrap();
        assert!(doc.is_base_namespace());
        assert_eq!(doc.namespace_index_map.len(), 1);
        let info = doc.node(&NodeIdVariant::Numeric(21)).unwrap().data_type().unwrap();
        let fields: Vec<_> = info
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.data_type.as_str()))
            .collect();
        assert_eq!(fields, vec![("Locale", "Locale"), ("Text", "String")]);
    }

    #[test]
    fn localized_text_elsewhere_keeps_its_definition() {
        let xml = r#"<UANodeSet>
  <Models><Model ModelUri="http://example.org/UA/Text/" /></Models>
  <UADataType NodeId="ns=1;i=3001" BrowseName="1:LocalizedText"><DisplayName>LocalizedText</DisplayName></UADataType>
</UANodeSet>"#;
        let doc = parse_nodeset2_str(xml).unwrap();
        let info = doc.node(&NodeIdVariant::Numeric(3001)).unwrap().data_type().unwrap();
        assert!(info.fields.is_empty());
    }

    #[test]
    fn namespace_uris_used_without_models() {
        let xml = r#"<UANodeSet>
  <NamespaceUris>
    <Uri>http://example.org/UA/Bare/</Uri>
    <Uri>http://example.org/UA/Motor/</Uri>
    <Uri>http://example.org/UA/Pump/</Uri>
  </NamespaceUris>
  <UAObject NodeId="ns=1;i=1" BrowseName="1:Thing" />
</UANodeSet>"#;
        let doc = parse_nodeset2_str(xml).unwrap();
        assert_eq!(doc.namespace_uri, "http://example.org/UA/Bare/");
        assert_eq!(doc.namespace_for_index(1), Some("http://example.org/UA/Bare/"));
        assert_eq!(doc.namespace_for_index(2), Some("http://example.org/UA/Motor/"));
        assert_eq!(doc.index_for_namespace("http://example.org/UA/Pump/"), Some(3));
        assert_eq!(
            doc.node(&NodeIdVariant::Numeric(1)).unwrap().namespace_uri,
            "http://example.org/UA/Bare/"
        );
        assert!(!doc.has_custom_types);
    }

    #[test]
    fn missing_model_fails() {
        let err = parse_nodeset2_str("<UANodeSet></UANodeSet>").unwrap_err();
        assert!(matches!(err.error, XmlErrorInner::MissingModel));
    }

    #[test]
    fn malformed_input_fails() {
        let truncated = &PUMP[..PUMP.len() / 2];
        assert!(parse_nodeset2_str(truncated).is_err());

        let bad_id = r#"<UANodeSet>
  <Models><Model ModelUri="http://example.org/UA/Pump/" /></Models>
  <UAObject NodeId="not-an-id" BrowseName="1:Thing" />
</UANodeSet>"#;
        let err = parse_nodeset2_str(bad_id).unwrap_err();
        assert!(matches!(err.error, XmlErrorInner::InvalidNodeId(_)));

        let missing = load_nodeset2_file("/nonexistent/Opc.Ua.NodeSet2.xml").unwrap_err();
        assert!(matches!(missing.error, XmlErrorInner::Io(..)));
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = parse_nodeset2_str(PUMP).unwrap();
        let b = parse_nodeset2_str(PUMP).unwrap();
        assert_eq!(a, b);
    }
}
