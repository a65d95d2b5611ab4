use log::{debug, warn};
use nodeset_xml::{
    node_id::strip_namespace_prefix, Argument, DataTypeInfo, NodeClass, NodeIdVariant,
    ParsedNodeId, UaNode,
};

use crate::{
    resolve::find_data_type,
    selection::{SelectionTree, TreeItem},
    session::Session,
    utils::{
        lower_first_char, model_folder_name, namespace_short_name, sanitize_name,
        user_code_segment,
    },
};

use super::value::{render_map, RenderMap, RenderValue};

const OBJECTS_FOLDER: &str = "UA_NODEID_NUMERIC(0, UA_NS0ID_OBJECTSFOLDER)";
const ORGANIZES: &str = "UA_NODEID_NUMERIC(0, UA_NS0ID_ORGANIZES)";

/// C string literal for `text`.
fn c_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// open62541 expression building the node id `value` in namespace `namespace`.
fn node_id_expression(namespace: i64, value: &NodeIdVariant) -> String {
    match value {
        NodeIdVariant::Numeric(i) => format!("UA_NODEID_NUMERIC({namespace}, {i})"),
        NodeIdVariant::String(s) => format!("UA_NODEID_STRING({namespace}, {})", c_string(s)),
        NodeIdVariant::Guid(g) => {
            format!("UA_NODEID_GUID({namespace}, UA_GUID({}))", c_string(&g.to_string()))
        }
        // Opaque ids go through the parser so arbitrary bytes survive.
        NodeIdVariant::ByteString(_) => {
            format!("UA_NODEID({})", c_string(&format!("ns={namespace};{value}")))
        }
    }
}

fn types_array_name(namespace_uri: &str) -> String {
    let ns = namespace_short_name(namespace_uri);
    if ns.is_empty() {
        "UA_TYPES".to_owned()
    } else {
        format!("UA_TYPES_{}", ns.to_uppercase())
    }
}

fn types_array_index_alias(namespace_uri: &str, type_name: &str) -> String {
    let ns = namespace_short_name(namespace_uri);
    let type_name = strip_namespace_prefix(type_name).to_uppercase();
    if ns.is_empty() {
        format!("UA_TYPES_{type_name}")
    } else {
        format!("UA_TYPES_{}_{type_name}", ns.to_uppercase())
    }
}

fn user_code_markers(kind: &str, name: &str) -> (String, String) {
    if kind.is_empty() {
        (
            format!("//BEGIN user code {name}"),
            format!("//END user code {name}"),
        )
    } else {
        (
            format!("//BEGIN user code {kind} {name}"),
            format!("//END user code {kind} {name}"),
        )
    }
}

/// Flattens the active part of a selection tree into render contexts.
pub struct ContextProjector<'a> {
    session: &'a Session,
    existing_source: Option<String>,
}

impl<'a> ContextProjector<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            existing_source: None,
        }
    }

    /// Previously generated source to carry user code regions over from.
    pub fn with_existing_source(mut self, source: impl Into<String>) -> Self {
        self.existing_source = Some(source.into());
        self
    }

    fn user_code(&self, kind: &str, name: &str) -> String {
        let Some(source) = &self.existing_source else {
            return String::new();
        };
        let (begin, end) = user_code_markers(kind, name);
        user_code_segment(source, &begin, &end)
    }

    fn namespace_index(&self, uri: &str) -> i64 {
        match self.session.namespace_index(uri) {
            Some(i) => i as i64,
            None => {
                warn!("Namespace {uri} is not part of the session");
                0
            }
        }
    }

    /// The context for the server source template.
    pub fn project(&self, tree: &SelectionTree) -> RenderValue {
        let documents = self.session.documents();
        let mut namespaces = Vec::new();
        let mut node_sets = Vec::new();
        for (index, doc) in documents.iter().enumerate() {
            namespaces.push(RenderValue::from(render_map! {
                "uri" => doc.uri(),
                "index" => index,
            }));
            let name = namespace_short_name(doc.uri());
            if !name.is_empty() {
                node_sets.push(RenderValue::from(render_map! {
                    "name" => name,
                    "hasCustomTypes" => doc.document.has_custom_types,
                }));
            }
        }
        node_sets.reverse();

        let active = tree.active_items();
        debug!("{} nodes selected", active.len());
        let mut root_nodes = Vec::new();
        let mut object_nodes = Vec::new();
        let mut variable_nodes = Vec::new();
        let mut method_nodes = Vec::new();
        for (index, id) in active.iter().enumerate() {
            let Some(item) = tree.get(*id) else {
                continue;
            };
            let mut map = self.node_map(index, tree, item);
            match item.node.class() {
                NodeClass::Variable => self.add_variable_entries(item, &mut map),
                NodeClass::Method => self.add_method_entries(item, &mut map),
                _ => {}
            }
            let value = RenderValue::from(map);
            if item.is_root() {
                root_nodes.push(value);
                continue;
            }
            match item.node.class() {
                NodeClass::Object => object_nodes.push(value),
                NodeClass::Variable => variable_nodes.push(value),
                NodeClass::Method => method_nodes.push(value),
                class => debug!("Not emitting {} {}", class, item.node.node_id),
            }
        }

        let mut context = render_map! {
            "nsCount" => documents.len(),
            "namespaces" => namespaces,
            "nodeSets" => node_sets,
            "nodeCount" => active.len(),
        };
        if !method_nodes.is_empty() {
            context.insert("methodCount".to_owned(), method_nodes.len().into());
        }
        context.insert("rootNodes".to_owned(), root_nodes.into());
        context.insert("objectNodes".to_owned(), object_nodes.into());
        context.insert("variableNodes".to_owned(), variable_nodes.into());
        context.insert("methodNodes".to_owned(), method_nodes.into());
        RenderValue::Map(context)
    }

    fn node_map(&self, index: usize, tree: &SelectionTree, item: &TreeItem) -> RenderMap {
        let node = &item.node;
        let mut map = render_map! {
            "nodeIndex" => index,
            "name" => item.generated_name(),
            "nodeId" => node.node_id.as_str(),
            "identifier" => node.identifier.value_string(),
            "namespaceIndex" => self.namespace_index(&node.namespace_uri),
            "browseName" => strip_namespace_prefix(&node.browse_name),
            "baseBrowseName" => strip_namespace_prefix(&item.base_browse_name),
            "displayName" => node.display_name.as_str(),
            "description" => node.description.as_str(),
            "isOptional" => node.is_optional,
        };

        let (parent, type_name, type_id) = if item.is_root() {
            (
                OBJECTS_FOLDER.to_owned(),
                "Organizes".to_owned(),
                ORGANIZES.to_owned(),
            )
        } else {
            let parent = item
                .parent()
                .and_then(|p| tree.get(p))
                .map(|p| sanitize_name(&format!("{}_NodeId", p.generated_name())))
                .unwrap_or_default();
            let (type_name, type_id) = self.reference_type(item);
            (parent, type_name, type_id)
        };
        map.insert("parentNodeId".to_owned(), parent.into());
        map.insert("referenceTypeName".to_owned(), type_name.into());
        map.insert("referenceTypeNodeId".to_owned(), type_id.into());
        map
    }

    /// Name and node id expression of the reference that connects `item` to
    /// its parent. Empty if it cannot be determined.
    fn reference_type(&self, item: &TreeItem) -> (String, String) {
        let Some(link) = &item.reference else {
            warn!("No parent reference for {}", item.node.node_id);
            return Default::default();
        };
        match ParsedNodeId::parse(&link.node_id) {
            Ok(id) => (
                link.name.clone(),
                node_id_expression(self.namespace_index(&link.namespace_uri), &id.value),
            ),
            Err(e) => {
                warn!(
                    "Reference type {} of {} is not a node id: {e}",
                    link.name, item.node.node_id
                );
                (link.name.clone(), String::new())
            }
        }
    }

    fn add_variable_entries(&self, item: &TreeItem, map: &mut RenderMap) {
        let node = &item.node;
        let data_type = match node.data_type() {
            Ok(d) => d.clone(),
            Err(e) => {
                warn!("{e}");
                DataTypeInfo::default()
            }
        };
        let name = item.generated_name();
        let type_name = strip_namespace_prefix(&data_type.definition_name).to_owned();

        // A type without fields is rendered as one field holding the value itself.
        let fields: Vec<(String, String)> = if data_type.fields.is_empty() {
            vec![(
                strip_namespace_prefix(&node.browse_name).to_owned(),
                data_type.definition_name.clone(),
            )]
        } else {
            data_type
                .fields
                .iter()
                .map(|f| {
                    let field_type = match f.value {
                        Some(v) => v.to_string(),
                        None => f.data_type.clone(),
                    };
                    (f.name.clone(), field_type)
                })
                .collect()
        };
        let mut have_values = true;
        let definition_fields: Vec<RenderValue> = fields
            .iter()
            .map(|(field, field_type)| {
                let value = item.field_value(field).unwrap_or_default();
                have_values &= !value.is_empty();
                RenderValue::from(render_map! {
                    "fieldName" => lower_first_char(strip_namespace_prefix(field)),
                    "fieldType" => field_type.as_str(),
                    "fieldValue" => value,
                    "isString" => field_type == "String" || field_type == "Locale",
                })
            })
            .collect();

        map.extend(render_map! {
            "dataType" => type_name.as_str(),
            "dataTypeVariableName" => lower_first_char(strip_namespace_prefix(&node.display_name)),
            "typesArrayName" => types_array_name(&data_type.namespace_uri),
            "typesArrayIndexAlias" => types_array_index_alias(&data_type.namespace_uri, &type_name),
            "isEnum" => data_type.is_enum,
            "singleFieldValueFlag" => fields.len() == 1,
            "fieldsHaveValuesFlag" => have_values,
            "definitionFields" => definition_fields,
            "readUserCode" => self.user_code("read", &name),
            "writeUserCode" => self.user_code("write", &name),
        });
    }

    fn add_method_entries(&self, item: &TreeItem, map: &mut RenderMap) {
        let method = match item.node.method() {
            Ok(m) => m.clone(),
            Err(e) => {
                warn!("{e}");
                Default::default()
            }
        };
        for (prefix, holder) in [
            ("input", method.input_arguments),
            ("output", method.output_arguments),
        ] {
            let arguments = holder
                .as_ref()
                .and_then(|h| self.session.node(h).map(|n| (h.document, n)))
                .map(|(document, n)| self.arguments(document, n))
                .unwrap_or_default();
            map.insert(
                format!("{prefix}ArgumentArrayDimensions"),
                arguments.len().into(),
            );
            map.insert(format!("{prefix}Arguments"), arguments.into());
        }
        map.insert(
            "userCode".to_owned(),
            self.user_code("", &item.generated_name()).into(),
        );
    }

    fn arguments(&self, document: usize, holder: &UaNode) -> Vec<RenderValue> {
        let arguments = match holder.arguments() {
            Ok(a) => a,
            Err(e) => {
                warn!("{e}");
                return Vec::new();
            }
        };
        arguments
            .iter()
            .enumerate()
            .map(|(index, argument)| RenderValue::from(self.argument(document, index, argument)))
            .collect()
    }

    fn argument(&self, document: usize, index: usize, argument: &Argument) -> RenderMap {
        let data_type = find_data_type(self.session.documents(), document, &argument.data_type)
            .and_then(|r| self.session.node(&r));
        let (type_name, info) = match data_type {
            Some(n) => (
                strip_namespace_prefix(&n.browse_name).to_owned(),
                n.data_type().cloned().unwrap_or_default(),
            ),
            None => {
                warn!(
                    "Data type {} of argument {} could not be resolved",
                    argument.data_type, argument.name
                );
                (String::new(), DataTypeInfo::default())
            }
        };

        let enum_values: Vec<RenderValue> = if info.is_enum {
            info.fields
                .iter()
                .map(|f| RenderValue::from(format!("{} = {}", f.name, f.value.unwrap_or_default())))
                .collect()
        } else {
            Vec::new()
        };
        let fields: Vec<RenderValue> = if info.is_enum {
            Vec::new()
        } else {
            info.fields
                .iter()
                .map(|f| {
                    RenderValue::from(render_map! {
                        "fieldName" => lower_first_char(&f.name),
                        "fieldType" => f.data_type.as_str(),
                    })
                })
                .collect()
        };

        render_map! {
            "argumentName" => lower_first_char(&argument.name),
            "argumentDataType" => type_name.as_str(),
            "typesArrayName" => types_array_name(&info.namespace_uri),
            "typesArrayIndexAlias" => types_array_index_alias(&info.namespace_uri, &type_name),
            "isEnum" => info.is_enum,
            "argumentEnumValues" => enum_values,
            "dataTypeFields" => fields,
            "argumentIndex" => index,
        }
    }

    /// The context for the build descriptor template. `project_name`
    /// defaults to the short name of the selected model.
    pub fn build_context(&self, project_name: Option<&str>) -> RenderValue {
        let session = self.session;
        let project_name = match project_name {
            Some(name) => name.to_owned(),
            None => namespace_short_name(session.selected_model_uri()),
        };

        let mut node_sets = Vec::new();
        for doc in session.documents().iter() {
            let name = namespace_short_name(doc.uri());
            if name.is_empty() {
                continue;
            }
            let depends: Vec<RenderValue> = doc
                .document
                .required_model_uris()
                .map(namespace_short_name)
                .filter(|n| !n.is_empty())
                .map(RenderValue::from)
                .collect();
            let files = session.companion_files(doc.uri());
            node_sets.push(RenderValue::from(render_map! {
                "nameUpper" => name.to_uppercase(),
                "name" => name,
                "nodesetDirPrefix" => model_folder_name(doc.uri()),
                "hasCustomTypes" => doc.document.has_custom_types,
                "depends" => depends,
                "file_ns" => files.nodeset.unwrap_or_default(),
                "file_csv" => files.node_ids_csv.unwrap_or_default(),
                "file_bsd" => files.types_bsd.unwrap_or_default(),
            }));
        }
        node_sets.reverse();

        RenderValue::from(render_map! {
            "projectName" => project_name.as_str(),
            "executableName" => project_name.as_str(),
            "nodeSets" => node_sets,
        })
    }
}
