//! Typed variables: the unit of data exchanged with the storage agent.
//!
//! A variable is a named, typed value plus a bag of free-form string
//! modifiers, carried on the wire as a `<var>` element. The wire `type`
//! attribute names one of nine kinds; the two `*_select` kinds are not
//! stored — an integer or string variable *is* a select variable exactly
//! when its modifiers carry `valid_values` (a `;`-separated list of allowed
//! literals).
//!
//! Scalar payloads may be replaced after construction. List payloads are
//! read-only: once built, their length and order never change.

use std::collections::BTreeMap;
use std::fmt;

use crate::document::{Element, Node};
use crate::error::{Result, WireError};

/// Wire tag for a variable element.
pub const VARIABLE_TAG: &str = "var";
/// Wire tag for one entry of a string-list variable.
pub const LIST_ENTRY_TAG: &str = "listentry";
/// Modifier key that turns an integer or string variable into a select.
pub const VALID_VALUES_MOD: &str = "valid_values";

const NAME_ATTR: &str = "name";
const VALUE_ATTR: &str = "value";
const TYPE_ATTR: &str = "type";

/// The kind of a variable as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Int,
    IntSelect,
    Boolean,
    Str,
    StrSelect,
    Float,
    Xml,
    ListStr,
    ListXml,
}

impl VarKind {
    /// The `type` attribute value for this kind.
    pub fn wire_name(self) -> &'static str {
        match self {
            VarKind::Int => "int",
            VarKind::IntSelect => "int_select",
            VarKind::Boolean => "boolean",
            VarKind::Str => "string",
            VarKind::StrSelect => "string_select",
            VarKind::Float => "float",
            VarKind::Xml => "xml",
            VarKind::ListStr => "list_str",
            VarKind::ListXml => "list_xml",
        }
    }

    /// Parse a wire `type` attribute value.
    pub fn from_wire_name(name: &str) -> Option<VarKind> {
        match name {
            "int" => Some(VarKind::Int),
            "int_select" => Some(VarKind::IntSelect),
            "boolean" => Some(VarKind::Boolean),
            "string" => Some(VarKind::Str),
            "string_select" => Some(VarKind::StrSelect),
            "float" => Some(VarKind::Float),
            "xml" => Some(VarKind::Xml),
            "list_str" => Some(VarKind::ListStr),
            "list_xml" => Some(VarKind::ListXml),
            _ => None,
        }
    }

    /// Whether the kind carries no `value` attribute on the wire (payload
    /// travels as child nodes instead).
    pub fn payload_in_children(self) -> bool {
        matches!(self, VarKind::Xml | VarKind::ListStr | VarKind::ListXml)
    }
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A variable's value.
///
/// Construction selects the kind; there is no runtime probing. `Xml` carries
/// an opaque sub-document the codec does not look into.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Xml(Element),
    StrList(Vec<String>),
    XmlList(Vec<Element>),
}

impl Payload {
    /// The kind this payload maps to, ignoring select promotion.
    fn base_kind(&self) -> VarKind {
        match self {
            Payload::Bool(_) => VarKind::Boolean,
            Payload::Int(_) => VarKind::Int,
            Payload::Float(_) => VarKind::Float,
            Payload::Str(_) => VarKind::Str,
            Payload::Xml(_) => VarKind::Xml,
            Payload::StrList(_) => VarKind::ListStr,
            Payload::XmlList(_) => VarKind::ListXml,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Payload::StrList(_) | Payload::XmlList(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Payload::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&Element> {
        match self {
            Payload::Xml(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            Payload::StrList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_xml_list(&self) -> Option<&[Element]> {
        match self {
            Payload::XmlList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Payload {
    fn from(v: bool) -> Self {
        Payload::Bool(v)
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Int(v)
    }
}

impl From<i32> for Payload {
    fn from(v: i32) -> Self {
        Payload::Int(v.into())
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Float(v)
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::Str(v.to_string())
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Str(v)
    }
}

impl From<Element> for Payload {
    fn from(v: Element) -> Self {
        Payload::Xml(v)
    }
}

impl From<Vec<String>> for Payload {
    fn from(v: Vec<String>) -> Self {
        Payload::StrList(v)
    }
}

impl From<Vec<Element>> for Payload {
    fn from(v: Vec<Element>) -> Self {
        Payload::XmlList(v)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bool(true) => f.write_str("true"),
            Payload::Bool(false) => f.write_str("false"),
            Payload::Int(n) => write!(f, "{n}"),
            Payload::Float(x) => write!(f, "{x}"),
            Payload::Str(s) => f.write_str(s),
            Payload::Xml(e) => f.write_str(&e.to_xml()),
            Payload::StrList(v) => write!(f, "[{}]", v.join(", ")),
            Payload::XmlList(v) => {
                for (i, e) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    f.write_str(&e.to_xml())?;
                }
                Ok(())
            }
        }
    }
}

/// A named, typed, modifier-annotated value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    payload: Payload,
    mods: BTreeMap<String, String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            mods: BTreeMap::new(),
        }
    }

    /// Builder-style modifier attachment.
    pub fn with_modifier(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_modifier(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The wire kind, with select promotion: an integer or string variable
    /// whose modifiers carry `valid_values` reports the `*_select` kind.
    pub fn kind(&self) -> VarKind {
        let base = self.payload.base_kind();
        if self.mods.contains_key(VALID_VALUES_MOD) {
            match base {
                VarKind::Int => return VarKind::IntSelect,
                VarKind::Str => return VarKind::StrSelect,
                _ => {}
            }
        }
        base
    }

    /// Replace the payload of a scalar variable. List payloads are read-only
    /// after construction, in both directions.
    pub fn set_value(&mut self, payload: impl Into<Payload>) -> Result<()> {
        let payload = payload.into();
        if self.payload.is_list() || payload.is_list() {
            return Err(WireError::ListImmutable);
        }
        self.payload = payload;
        Ok(())
    }

    pub fn modifiers(&self) -> &BTreeMap<String, String> {
        &self.mods
    }

    pub fn modifier(&self, name: &str) -> Option<&str> {
        self.mods.get(name).map(String::as_str)
    }

    pub fn set_modifier(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.mods.insert(name.into(), value.into());
    }

    /// The allowed literals of a select variable, split out of the
    /// `valid_values` modifier.
    pub fn valid_values(&self) -> Option<Vec<&str>> {
        self.mods
            .get(VALID_VALUES_MOD)
            .map(|v| v.split(';').collect())
    }

    /// Encode as a `<var>` element.
    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(VARIABLE_TAG);
        elem.set_attr(NAME_ATTR, &self.name);
        elem.set_attr(TYPE_ATTR, self.kind().wire_name());
        match &self.payload {
            Payload::Bool(b) => {
                elem.set_attr(VALUE_ATTR, if *b { "true" } else { "false" });
            }
            Payload::Int(n) => {
                elem.set_attr(VALUE_ATTR, n.to_string());
            }
            Payload::Float(x) => {
                elem.set_attr(VALUE_ATTR, x.to_string());
            }
            Payload::Str(s) => {
                elem.set_attr(VALUE_ATTR, s);
            }
            Payload::Xml(doc) => {
                elem.append(doc.clone());
            }
            Payload::StrList(items) => {
                for item in items {
                    elem.append(Element::new(LIST_ENTRY_TAG).with_attr(VALUE_ATTR, item));
                }
            }
            Payload::XmlList(docs) => {
                for doc in docs {
                    elem.append(doc.clone());
                }
            }
        }
        for (name, value) in &self.mods {
            elem.set_attr(name, value);
        }
        elem
    }
}

/// Decode a `<var>` element into a [`Variable`].
///
/// The node must be an element named `var` carrying `name` and `type`
/// attributes; `value` is also required unless the payload travels in child
/// nodes. Every other attribute becomes a modifier verbatim.
pub fn parse_variable(node: &Node) -> Result<Variable> {
    let elem = node
        .as_element()
        .ok_or_else(|| WireError::MalformedVariable("not an element".into()))?;
    if elem.name() != VARIABLE_TAG {
        return Err(WireError::MalformedVariable(format!(
            "unexpected element {}",
            elem.name()
        )));
    }

    let name = elem
        .attr(NAME_ATTR)
        .ok_or_else(|| WireError::MalformedVariable("missing name attribute".into()))?;
    if name.is_empty() {
        return Err(WireError::MalformedVariable("empty name attribute".into()));
    }
    let type_name = elem
        .attr(TYPE_ATTR)
        .ok_or_else(|| WireError::MalformedVariable(format!("variable {name} missing type")))?;

    let value = elem.attr(VALUE_ATTR);
    let needs_value = !matches!(
        VarKind::from_wire_name(type_name),
        Some(kind) if kind.payload_in_children()
    );
    if needs_value && value.is_none() {
        return Err(WireError::MalformedVariable(format!(
            "variable {name} missing value"
        )));
    }

    let mut mods = BTreeMap::new();
    for (attr, attr_value) in elem.attrs() {
        if attr != NAME_ATTR && attr != VALUE_ATTR && attr != TYPE_ATTR {
            mods.insert(attr.to_string(), attr_value.to_string());
        }
    }

    let kind = VarKind::from_wire_name(type_name)
        .ok_or_else(|| WireError::UnknownVariableType(type_name.to_string()))?;

    let payload = match kind {
        VarKind::Str => Payload::Str(value.unwrap_or_default().to_string()),
        VarKind::StrSelect => {
            require_valid_values(name, &mods)?;
            Payload::Str(value.unwrap_or_default().to_string())
        }
        VarKind::Int => Payload::Int(parse_int(name, value.unwrap_or_default())?),
        VarKind::IntSelect => {
            require_valid_values(name, &mods)?;
            Payload::Int(parse_int(name, value.unwrap_or_default())?)
        }
        VarKind::Float => {
            let raw = value.unwrap_or_default();
            let parsed: f64 = raw.parse().map_err(|_| {
                WireError::MalformedVariable(format!("variable {name}: bad float literal {raw}"))
            })?;
            Payload::Float(parsed)
        }
        VarKind::Boolean => Payload::Bool(value == Some("true")),
        VarKind::Xml => {
            let doc = elem.first_element().ok_or_else(|| {
                WireError::MalformedVariable(format!("variable {name} missing document payload"))
            })?;
            Payload::Xml(doc.clone())
        }
        VarKind::ListStr => {
            let mut items = Vec::new();
            for entry in elem.child_elements() {
                if entry.name() != LIST_ENTRY_TAG {
                    continue;
                }
                match entry.attr(VALUE_ATTR) {
                    Some(v) => items.push(v.to_string()),
                    None => return Err(WireError::MalformedListEntry(name.to_string())),
                }
            }
            Payload::StrList(items)
        }
        VarKind::ListXml => Payload::XmlList(elem.child_elements().cloned().collect()),
    };

    Ok(Variable {
        name: name.to_string(),
        payload,
        mods,
    })
}

fn require_valid_values(name: &str, mods: &BTreeMap<String, String>) -> Result<()> {
    if mods.contains_key(VALID_VALUES_MOD) {
        Ok(())
    } else {
        Err(WireError::MalformedVariable(format!(
            "select variable {name} missing {VALID_VALUES_MOD}"
        )))
    }
}

fn parse_int(name: &str, raw: &str) -> Result<i64> {
    raw.parse().map_err(|_| {
        WireError::MalformedVariable(format!("variable {name}: bad integer literal {raw}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(xml: &str) -> Result<Variable> {
        let elem = Element::parse(xml.as_bytes()).unwrap();
        parse_variable(&Node::Element(elem))
    }

    #[test]
    fn encode_int_variable() {
        let var = Variable::new("count", 5);
        assert_eq!(
            var.to_element().to_xml(),
            r#"<var name="count" type="int" value="5"/>"#
        );
    }

    #[test]
    fn decode_string_select() {
        let var = parse(r#"<var name="mode" type="string_select" value="fast" valid_values="fast;slow"/>"#)
            .unwrap();
        assert_eq!(var.payload().as_str(), Some("fast"));
        assert_eq!(var.kind(), VarKind::StrSelect);
        assert_eq!(var.modifier("valid_values"), Some("fast;slow"));
        assert_eq!(var.valid_values(), Some(vec!["fast", "slow"]));
    }

    #[test]
    fn decode_select_without_valid_values_fails() {
        assert!(matches!(
            parse(r#"<var name="mode" type="string_select" value="fast"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
        assert!(matches!(
            parse(r#"<var name="n" type="int_select" value="1"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
    }

    #[test]
    fn valid_values_promotes_kind() {
        let var = Variable::new("level", 3).with_modifier("valid_values", "1;2;3");
        assert_eq!(var.kind(), VarKind::IntSelect);
        assert_eq!(var.to_element().attr("type"), Some("int_select"));

        // Promotion only applies to integers and strings.
        let var = Variable::new("flag", true).with_modifier("valid_values", "true;false");
        assert_eq!(var.kind(), VarKind::Boolean);
    }

    #[test]
    fn boolean_decodes_literal_true_only() {
        assert_eq!(
            parse(r#"<var name="b" type="boolean" value="true"/>"#)
                .unwrap()
                .payload()
                .as_bool(),
            Some(true)
        );
        for literal in ["false", "True", "TRUE", "1", ""] {
            let xml = format!(r#"<var name="b" type="boolean" value="{literal}"/>"#);
            let elem = Element::parse(xml.as_bytes()).unwrap();
            let var = parse_variable(&Node::Element(elem)).unwrap();
            assert_eq!(var.payload().as_bool(), Some(false), "literal {literal:?}");
        }
    }

    #[test]
    fn int_decode_rejects_bad_literal() {
        assert!(matches!(
            parse(r#"<var name="n" type="int" value="5.0"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
        // Leading zeros normalize but keep the parsed value.
        let var = parse(r#"<var name="n" type="int" value="-007"/>"#).unwrap();
        assert_eq!(var.payload().as_int(), Some(-7));
        assert_eq!(var.to_element().attr("value"), Some("-7"));
    }

    #[test]
    fn unknown_type_fails() {
        assert!(matches!(
            parse(r#"<var name="n" type="list_int" value="1"/>"#),
            Err(WireError::UnknownVariableType(_))
        ));
    }

    #[test]
    fn missing_required_attrs_fail() {
        assert!(matches!(
            parse(r#"<var type="int" value="1"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
        assert!(matches!(
            parse(r#"<var name="" type="int" value="1"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
        assert!(matches!(
            parse(r#"<var name="n" value="1"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
        assert!(matches!(
            parse(r#"<var name="n" type="int"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
        assert!(matches!(
            parse_variable(&Node::Text("  ".into())),
            Err(WireError::MalformedVariable(_))
        ));
        assert!(matches!(
            parse(r#"<other name="n" type="int" value="1"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
    }

    #[test]
    fn decode_str_list_in_document_order() {
        let var = parse(
            r#"<var name="devices" type="list_str">
                 <listentry value="/dev/sda"/>
                 <other value="skipped"/>
                 <listentry value="/dev/sdb"/>
               </var>"#,
        )
        .unwrap();
        assert_eq!(
            var.payload().as_str_list().unwrap(),
            ["/dev/sda", "/dev/sdb"]
        );
    }

    #[test]
    fn str_list_entry_without_value_fails() {
        assert!(matches!(
            parse(r#"<var name="devices" type="list_str"><listentry/></var>"#),
            Err(WireError::MalformedListEntry(_))
        ));
    }

    #[test]
    fn decode_xml_list_collects_all_elements() {
        let var = parse(
            r#"<var name="targets" type="list_xml">
                 <block_device id="a"/>
                 <mapper id="b"/>
               </var>"#,
        )
        .unwrap();
        let docs = var.payload().as_xml_list().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name(), "block_device");
        assert_eq!(docs[1].name(), "mapper");
    }

    #[test]
    fn decode_xml_keeps_first_element_only() {
        let var = parse(r#"<var name="bd" type="xml"><block_device id="a"/><dropped/></var>"#)
            .unwrap();
        assert_eq!(var.payload().as_xml().unwrap().name(), "block_device");

        assert!(matches!(
            parse(r#"<var name="bd" type="xml"/>"#),
            Err(WireError::MalformedVariable(_))
        ));
    }

    #[test]
    fn extra_attributes_round_trip_as_modifiers() {
        let var = parse(
            r#"<var name="size" type="int" value="512" mutable="false" units="MB" min="1"/>"#,
        )
        .unwrap();
        assert_eq!(var.modifier("mutable"), Some("false"));
        assert_eq!(var.modifier("units"), Some("MB"));

        let elem = var.to_element();
        assert_eq!(elem.attr("mutable"), Some("false"));
        assert_eq!(elem.attr("units"), Some("MB"));
        assert_eq!(elem.attr("min"), Some("1"));

        let back = parse_variable(&Node::Element(elem)).unwrap();
        assert_eq!(back, var);
    }

    #[test]
    fn scalar_round_trips() {
        for var in [
            Variable::new("b", true),
            Variable::new("n", -42),
            Variable::new("x", 3.25),
            Variable::new("s", "hello world"),
            Variable::new("d", Element::new("mapper").with_attr("id", "vg0")),
        ] {
            let back = parse_variable(&Node::Element(var.to_element())).unwrap();
            assert_eq!(back, var);
        }
    }

    #[test]
    fn list_round_trips_preserve_order() {
        let var = Variable::new(
            "paths",
            vec!["c".to_string(), "a".to_string(), "b".to_string()],
        );
        let back = parse_variable(&Node::Element(var.to_element())).unwrap();
        assert_eq!(back.payload().as_str_list().unwrap(), ["c", "a", "b"]);
    }

    #[test]
    fn list_values_are_immutable() {
        let mut var = Variable::new("paths", vec!["a".to_string()]);
        assert!(matches!(
            var.set_value("replacement"),
            Err(WireError::ListImmutable)
        ));

        // A scalar cannot be turned into a list either.
        let mut scalar = Variable::new("n", 1);
        assert!(matches!(
            scalar.set_value(vec!["a".to_string()]),
            Err(WireError::ListImmutable)
        ));

        // Scalars stay mutable, and the kind follows the payload.
        scalar.set_value("text").unwrap();
        assert_eq!(scalar.kind(), VarKind::Str);
    }
}
