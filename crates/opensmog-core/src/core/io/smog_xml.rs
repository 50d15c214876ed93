use crate::core::io::traits::InputFile;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashSet;
use std::io::{self, BufRead};
use thiserror::Error;
use tracing::warn;

/// Newest `OpenSMOGminVersion` this reader understands.
pub const SUPPORTED_VERSION: &str = "1.0.4";

#[derive(Debug, Error)]
pub enum SmogXmlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed XML: {0}")]
    Xml(String),
    #[error("The xml file is not in the correct format: {0}")]
    Schema(String),
    #[error("No contacts were found in the XML file")]
    NoContacts,
    #[error("Duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },
}

/// One pairwise interaction of a contact group; atom indices are one-based.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactInteraction {
    pub i: usize,
    pub j: usize,
    /// Parameter values in the group's declared parameter order.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactGroup {
    pub name: String,
    pub expression: String,
    pub parameters: Vec<String>,
    pub interactions: Vec<ContactInteraction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonbondPair {
    pub type1: String,
    pub type2: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonbondGroup {
    /// Position of the group within `<nonbond>`, used to name the force.
    pub index: usize,
    pub expression: String,
    pub parameters: Vec<String>,
    pub pairs: Vec<NonbondPair>,
}

/// Custom potentials described by a SMOG 2 `-OpenSMOG` XML file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmogForces {
    pub min_version: String,
    /// Global constants in declaration order.
    pub constants: Vec<(String, f64)>,
    pub contacts: Vec<ContactGroup>,
    pub nonbond: Vec<NonbondGroup>,
}

impl SmogForces {
    pub fn has_nonbond(&self) -> bool {
        !self.nonbond.is_empty()
    }
}

/// Minimal element tree; the documents are small enough to hold in memory.
#[derive(Debug, Clone, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required_attribute(&self, key: &str) -> Result<&str, SmogXmlError> {
        self.attribute(key).ok_or_else(|| {
            SmogXmlError::Schema(format!(
                "element <{}> is missing attribute '{}'",
                self.name, key
            ))
        })
    }

    fn children_named<'s, 'n>(
        &'s self,
        name: &'n str,
    ) -> impl Iterator<Item = &'s Node> + use<'s, 'n> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn only_children(&self, allowed: &[&str]) -> Result<(), SmogXmlError> {
        match self
            .children
            .iter()
            .find(|c| !allowed.contains(&c.name.as_str()))
        {
            Some(unexpected) => Err(SmogXmlError::Schema(format!(
                "unexpected element <{}> inside <{}>",
                unexpected.name, self.name
            ))),
            None => Ok(()),
        }
    }

    fn single_child(&self, name: &str) -> Result<&Node, SmogXmlError> {
        let mut matches = self.children_named(name);
        match (matches.next(), matches.next()) {
            (Some(node), None) => Ok(node),
            (None, _) => Err(SmogXmlError::Schema(format!(
                "element <{}> requires a <{}> child",
                self.name, name
            ))),
            (Some(_), Some(_)) => Err(SmogXmlError::Schema(format!(
                "element <{}> allows only one <{}> child",
                self.name, name
            ))),
        }
    }

    fn optional_child(&self, name: &str) -> Result<Option<&Node>, SmogXmlError> {
        let mut matches = self.children_named(name);
        match (matches.next(), matches.next()) {
            (first, None) => Ok(first),
            _ => Err(SmogXmlError::Schema(format!(
                "element <{}> allows at most one <{}> child",
                self.name, name
            ))),
        }
    }
}

fn start_node(e: &BytesStart) -> Result<Node, SmogXmlError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SmogXmlError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| SmogXmlError::Xml(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Node {
        name,
        attributes,
        ..Default::default()
    })
}

fn parse_tree(xml: &str) -> Result<Node, SmogXmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root = None;

    loop {
        match reader
            .read_event()
            .map_err(|err| SmogXmlError::Xml(err.to_string()))?
        {
            Event::Start(e) => stack.push(start_node(&e)?),
            Event::Empty(e) => {
                let node = start_node(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(t) => {
                if let Some(node) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|err| SmogXmlError::Xml(err.to_string()))?;
                    node.text.push_str(text.trim());
                }
            }
            Event::CData(t) => {
                if let Some(node) = stack.last_mut() {
                    node.text
                        .push_str(String::from_utf8_lossy(t.as_ref()).trim());
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| SmogXmlError::Xml("unbalanced closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SmogXmlError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| SmogXmlError::Xml("document has no root element".to_string()))
}

fn parse_number(node: &Node, key: &str) -> Result<f64, SmogXmlError> {
    let raw = node.required_attribute(key)?;
    raw.trim().parse().map_err(|_| {
        SmogXmlError::Schema(format!(
            "attribute '{}' of <{}> is not a number (value: '{}')",
            key, node.name, raw
        ))
    })
}

fn parse_atom_index(node: &Node, key: &str) -> Result<usize, SmogXmlError> {
    let raw = node.required_attribute(key)?;
    match raw.trim().parse::<usize>() {
        Ok(index) if index >= 1 => Ok(index),
        _ => Err(SmogXmlError::Schema(format!(
            "attribute '{}' of <{}> must be a positive integer (value: '{}')",
            key, node.name, raw
        ))),
    }
}

fn check_attributes(node: &Node, fixed: &[&str], parameters: &[String]) -> Result<(), SmogXmlError> {
    for (key, _) in &node.attributes {
        if !fixed.contains(&key.as_str()) && !parameters.iter().any(|p| p == key) {
            return Err(SmogXmlError::Schema(format!(
                "unexpected attribute '{}' on <{}>",
                key, node.name
            )));
        }
    }
    Ok(())
}

/// Reads the expression and ordered parameter names shared by both group kinds.
fn expression_and_parameters(group: &Node) -> Result<(String, Vec<String>), SmogXmlError> {
    let expression = group.single_child("expression")?.required_attribute("expr")?;
    if expression.trim().is_empty() {
        return Err(SmogXmlError::Schema(format!(
            "<expression> inside <{}> is empty",
            group.name
        )));
    }

    let mut seen = HashSet::new();
    let mut parameters = Vec::new();
    for parameter in group.children_named("parameter") {
        let name = parameter.text.trim();
        if name.is_empty() {
            return Err(SmogXmlError::Schema(format!(
                "<parameter> inside <{}> is empty",
                group.name
            )));
        }
        if !seen.insert(name.to_string()) {
            return Err(SmogXmlError::Duplicate {
                kind: "parameter",
                name: name.to_string(),
            });
        }
        parameters.push(name.to_string());
    }
    Ok((expression.to_string(), parameters))
}

fn parse_constants(node: &Node) -> Result<Vec<(String, f64)>, SmogXmlError> {
    node.only_children(&["constant"])?;
    let mut seen = HashSet::new();
    let mut constants = Vec::new();
    for constant in node.children_named("constant") {
        check_attributes(constant, &["name", "value"], &[])?;
        let name = constant.required_attribute("name")?.to_string();
        let value = parse_number(constant, "value")?;
        if !seen.insert(name.clone()) {
            return Err(SmogXmlError::Duplicate {
                kind: "constant",
                name,
            });
        }
        constants.push((name, value));
    }
    Ok(constants)
}

fn parse_contacts(node: &Node) -> Result<Vec<ContactGroup>, SmogXmlError> {
    node.only_children(&["contacts_type"])?;
    let mut seen = HashSet::new();
    let mut groups = Vec::new();

    for group in node.children_named("contacts_type") {
        group.only_children(&["expression", "parameter", "interaction"])?;
        check_attributes(group, &["name"], &[])?;
        let name = group.required_attribute("name")?.to_string();
        if !seen.insert(name.clone()) {
            return Err(SmogXmlError::Duplicate {
                kind: "contacts_type",
                name,
            });
        }
        let (expression, parameters) = expression_and_parameters(group)?;

        let mut atom_pairs = HashSet::new();
        let interactions = group
            .children_named("interaction")
            .map(|interaction| {
                check_attributes(interaction, &["i", "j"], &parameters)?;
                let i = parse_atom_index(interaction, "i")?;
                let j = parse_atom_index(interaction, "j")?;
                if !atom_pairs.insert((i.min(j), i.max(j))) {
                    return Err(SmogXmlError::Duplicate {
                        kind: "interaction",
                        name: format!("{}-{} in contacts_type '{}'", i, j, name),
                    });
                }
                Ok(ContactInteraction {
                    i,
                    j,
                    values: parameters
                        .iter()
                        .map(|p| parse_number(interaction, p))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, SmogXmlError>>()?;

        if interactions.is_empty() {
            return Err(SmogXmlError::Schema(format!(
                "<contacts_type name=\"{}\"> has no <interaction> elements",
                name
            )));
        }

        groups.push(ContactGroup {
            name,
            expression,
            parameters,
            interactions,
        });
    }
    Ok(groups)
}

fn parse_nonbond(node: &Node) -> Result<Vec<NonbondGroup>, SmogXmlError> {
    node.only_children(&["nonbond_bytype"])?;
    node.children_named("nonbond_bytype")
        .enumerate()
        .map(|(index, group)| {
            group.only_children(&["expression", "parameter", "nonbond_param"])?;
            check_attributes(group, &[], &[])?;
            let (expression, parameters) = expression_and_parameters(group)?;
            let mut type_pairs = HashSet::new();
            let pairs = group
                .children_named("nonbond_param")
                .map(|pair| {
                    check_attributes(pair, &["type1", "type2"], &parameters)?;
                    let type1 = pair.required_attribute("type1")?.to_string();
                    let type2 = pair.required_attribute("type2")?.to_string();
                    let key = if type1 <= type2 {
                        (type1.clone(), type2.clone())
                    } else {
                        (type2.clone(), type1.clone())
                    };
                    if !type_pairs.insert(key) {
                        return Err(SmogXmlError::Duplicate {
                            kind: "nonbond_param",
                            name: format!("{}-{}", type1, type2),
                        });
                    }
                    Ok(NonbondPair {
                        type1,
                        type2,
                        values: parameters
                            .iter()
                            .map(|p| parse_number(pair, p))
                            .collect::<Result<_, _>>()?,
                    })
                })
                .collect::<Result<Vec<_>, SmogXmlError>>()?;
            Ok(NonbondGroup {
                index,
                expression,
                parameters,
                pairs,
            })
        })
        .collect()
}

/// Compares dotted version strings numerically; missing components count as zero.
fn version_newer_than(version: &str, reference: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(version), parse(reference));
    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
        if x != y {
            return x > y;
        }
    }
    false
}

/// Reader for the SMOG 2 custom-potential XML format.
pub struct SmogXml;

impl SmogXml {
    pub fn parse_str(xml: &str) -> Result<SmogForces, SmogXmlError> {
        let root = parse_tree(xml)?;
        if root.name != "OpenSMOGforces" {
            return Err(SmogXmlError::Schema(format!(
                "root element must be <OpenSMOGforces>, found <{}>",
                root.name
            )));
        }
        root.only_children(&["OpenSMOGminVersion", "constants", "contacts", "nonbond"])?;
        check_attributes(&root, &[], &[])?;

        let min_version = root.single_child("OpenSMOGminVersion")?.text.clone();
        if min_version.is_empty() {
            return Err(SmogXmlError::Schema(
                "<OpenSMOGminVersion> is empty".to_string(),
            ));
        }
        if version_newer_than(&min_version, SUPPORTED_VERSION) {
            warn!(
                "The XML file requires OpenSMOG {} but this reader supports {}. Some features may be unavailable.",
                min_version, SUPPORTED_VERSION
            );
        }

        let constants = match root.optional_child("constants")? {
            Some(node) => parse_constants(node)?,
            None => Vec::new(),
        };
        let contacts = match root.optional_child("contacts")? {
            Some(node) => parse_contacts(node)?,
            None => return Err(SmogXmlError::NoContacts),
        };
        if contacts.is_empty() {
            return Err(SmogXmlError::NoContacts);
        }
        let nonbond = match root.optional_child("nonbond")? {
            Some(node) => parse_nonbond(node)?,
            None => Vec::new(),
        };

        Ok(SmogForces {
            min_version,
            constants,
            contacts,
            nonbond,
        })
    }
}

impl InputFile for SmogXml {
    type Output = SmogForces;
    type Error = SmogXmlError;

    fn read_from(reader: &mut impl BufRead) -> Result<SmogForces, SmogXmlError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) const CONTACTS_AND_NONBOND: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<OpenSMOGforces>
  <OpenSMOGminVersion>1.0</OpenSMOGminVersion>
  <constants>
    <constant name="eps_c" value="1.5"/>
  </constants>
  <contacts>
    <contacts_type name="contact_1-10-12">
      <expression expr="eps_c*(A/r^12-B/r^10)"/>
      <parameter>A</parameter>
      <parameter>B</parameter>
      <interaction i="1" j="4" A="1.0e-6" B="2.0e-5"/>
      <interaction i="2" j="4" A="3.0e-6" B="4.0e-5"/>
    </contacts_type>
    <contacts_type name="contact_gauss">
      <expression expr="-eps*exp(-(r-r0)^2/(2*sigma^2))"/>
      <parameter>eps</parameter>
      <parameter>r0</parameter>
      <parameter>sigma</parameter>
      <interaction i="1" j="3" eps="1" r0="0.5" sigma="0.05"/>
    </contacts_type>
  </contacts>
  <nonbond>
    <nonbond_bytype>
      <expression expr="C12(type1,type2)/r^12"/>
      <parameter>C12</parameter>
      <nonbond_param type1="NB_1" type2="NB_1" C12="1.0e-9"/>
      <nonbond_param type1="NB_1" type2="NB_2" C12="2.0e-9"/>
      <nonbond_param type1="NB_2" type2="NB_2" C12="3.0e-9"/>
    </nonbond_bytype>
  </nonbond>
</OpenSMOGforces>
"#;

    #[test]
    fn parse_reads_constants_contacts_and_nonbond() {
        let forces = SmogXml::parse_str(CONTACTS_AND_NONBOND).unwrap();
        assert_eq!(forces.min_version, "1.0");
        assert_eq!(forces.constants, vec![("eps_c".to_string(), 1.5)]);

        assert_eq!(forces.contacts.len(), 2);
        let first = &forces.contacts[0];
        assert_eq!(first.name, "contact_1-10-12");
        assert_eq!(first.expression, "eps_c*(A/r^12-B/r^10)");
        assert_eq!(first.parameters, vec!["A", "B"]);
        assert_eq!(first.interactions[1].i, 2);
        assert_eq!(first.interactions[1].j, 4);
        assert_relative_eq!(first.interactions[1].values[1], 4.0e-5);

        let gauss = &forces.contacts[1];
        assert_eq!(gauss.parameters, vec!["eps", "r0", "sigma"]);
        assert_relative_eq!(gauss.interactions[0].values[2], 0.05);

        assert!(forces.has_nonbond());
        let nonbond = &forces.nonbond[0];
        assert_eq!(nonbond.index, 0);
        assert_eq!(nonbond.parameters, vec!["C12"]);
        assert_eq!(nonbond.pairs.len(), 3);
        assert_eq!(nonbond.pairs[1].type2, "NB_2");
    }

    #[test]
    fn parameter_values_follow_declared_order_not_attribute_order() {
        let xml = r#"<OpenSMOGforces>
  <OpenSMOGminVersion>1.0</OpenSMOGminVersion>
  <contacts>
    <contacts_type name="c">
      <expression expr="A*B"/>
      <parameter>A</parameter>
      <parameter>B</parameter>
      <interaction B="2" j="2" A="1" i="1"/>
    </contacts_type>
  </contacts>
</OpenSMOGforces>"#;
        let forces = SmogXml::parse_str(xml).unwrap();
        assert_eq!(forces.contacts[0].interactions[0].values, vec![1.0, 2.0]);
        assert!(forces.constants.is_empty());
        assert!(!forces.has_nonbond());
    }

    #[test]
    fn missing_contacts_section_is_rejected() {
        let xml = "<OpenSMOGforces><OpenSMOGminVersion>1.0</OpenSMOGminVersion></OpenSMOGforces>";
        assert!(matches!(
            SmogXml::parse_str(xml),
            Err(SmogXmlError::NoContacts)
        ));
    }

    #[test]
    fn missing_version_is_a_schema_error() {
        let xml = r#"<OpenSMOGforces><contacts/></OpenSMOGforces>"#;
        assert!(matches!(
            SmogXml::parse_str(xml),
            Err(SmogXmlError::Schema(_))
        ));
    }

    #[test]
    fn wrong_root_is_a_schema_error() {
        let xml = "<forces><OpenSMOGminVersion>1.0</OpenSMOGminVersion></forces>";
        assert!(matches!(
            SmogXml::parse_str(xml),
            Err(SmogXmlError::Schema(_))
        ));
    }

    #[test]
    fn interaction_missing_parameter_is_a_schema_error() {
        let xml = r#"<OpenSMOGforces>
  <OpenSMOGminVersion>1.0</OpenSMOGminVersion>
  <contacts>
    <contacts_type name="c">
      <expression expr="A/r"/>
      <parameter>A</parameter>
      <interaction i="1" j="2"/>
    </contacts_type>
  </contacts>
</OpenSMOGforces>"#;
        let err = SmogXml::parse_str(xml).unwrap_err();
        assert!(err.to_string().contains("missing attribute 'A'"));
    }

    #[test]
    fn zero_atom_index_is_a_schema_error() {
        let xml = r#"<OpenSMOGforces>
  <OpenSMOGminVersion>1.0</OpenSMOGminVersion>
  <contacts>
    <contacts_type name="c">
      <expression expr="A/r"/>
      <parameter>A</parameter>
      <interaction i="0" j="2" A="1"/>
    </contacts_type>
  </contacts>
</OpenSMOGforces>"#;
        assert!(matches!(
            SmogXml::parse_str(xml),
            Err(SmogXmlError::Schema(_))
        ));
    }

    #[test]
    fn unknown_element_is_a_schema_error() {
        let xml = r#"<OpenSMOGforces>
  <OpenSMOGminVersion>1.0</OpenSMOGminVersion>
  <contacts>
    <contacts_type name="c">
      <expression expr="A/r"/>
      <parameter>A</parameter>
      <interaction i="1" j="2" A="1"/>
    </contacts_type>
  </contacts>
  <bogus/>
</OpenSMOGforces>"#;
        let err = SmogXml::parse_str(xml).unwrap_err();
        assert!(err.to_string().contains("unexpected element <bogus>"));
    }

    #[test]
    fn duplicate_contact_names_are_rejected() {
        let group = r#"<contacts_type name="c">
      <expression expr="A/r"/>
      <parameter>A</parameter>
      <interaction i="1" j="2" A="1"/>
    </contacts_type>"#;
        let xml = format!(
            "<OpenSMOGforces><OpenSMOGminVersion>1.0</OpenSMOGminVersion><contacts>{}{}</contacts></OpenSMOGforces>",
            group, group
        );
        assert!(matches!(
            SmogXml::parse_str(&xml),
            Err(SmogXmlError::Duplicate {
                kind: "contacts_type",
                ..
            })
        ));
    }

    #[test]
    fn single_and_optional_children_borrow_from_the_tree() {
        let root = parse_tree(CONTACTS_AND_NONBOND).unwrap();
        let key = String::from("OpenSMOGminVersion");
        let version = root.single_child(&key).unwrap();
        drop(key);
        assert_eq!(version.text, "1.0");

        let constants = root.optional_child(&String::from("constants")).unwrap();
        assert_eq!(constants.map(|c| c.children.len()), Some(1));
        assert!(root.optional_child("nonexistent").unwrap().is_none());
        assert!(root.single_child("nonexistent").is_err());
    }

    #[test]
    fn repeated_nonbond_type_pair_is_rejected_in_either_order() {
        let xml = CONTACTS_AND_NONBOND.replace(
            r#"<nonbond_param type1="NB_2" type2="NB_2" C12="3.0e-9"/>"#,
            r#"<nonbond_param type1="NB_2" type2="NB_2" C12="3.0e-9"/>
      <nonbond_param type1="NB_2" type2="NB_1" C12="9.0e-9"/>"#,
        );
        let err = SmogXml::parse_str(&xml).unwrap_err();
        assert!(matches!(
            err,
            SmogXmlError::Duplicate {
                kind: "nonbond_param",
                ..
            }
        ));
        assert!(err.to_string().contains("NB_2-NB_1"));
    }

    #[test]
    fn repeated_contact_pair_within_a_group_is_rejected() {
        let xml = CONTACTS_AND_NONBOND.replace(
            r#"<interaction i="2" j="4" A="3.0e-6" B="4.0e-5"/>"#,
            r#"<interaction i="2" j="4" A="3.0e-6" B="4.0e-5"/>
      <interaction i="4" j="1" A="5.0e-6" B="6.0e-5"/>"#,
        );
        assert!(matches!(
            SmogXml::parse_str(&xml),
            Err(SmogXmlError::Duplicate {
                kind: "interaction",
                ..
            })
        ));
    }

    #[test]
    fn same_atom_pair_in_different_groups_is_accepted() {
        let xml = CONTACTS_AND_NONBOND.replace(
            r#"<interaction i="1" j="3" eps="1" r0="0.5" sigma="0.05"/>"#,
            r#"<interaction i="1" j="4" eps="1" r0="0.5" sigma="0.05"/>"#,
        );
        let forces = SmogXml::parse_str(&xml).unwrap();
        assert_eq!(forces.contacts[1].interactions[0].j, 4);
    }

    #[test]
    fn unknown_attribute_on_contacts_type_is_a_schema_error() {
        let xml = CONTACTS_AND_NONBOND.replace(
            r#"<contacts_type name="contact_gauss">"#,
            r#"<contacts_type name="contact_gauss" cutoff="2.0">"#,
        );
        let err = SmogXml::parse_str(&xml).unwrap_err();
        assert!(err.to_string().contains("unexpected attribute 'cutoff'"));
    }

    #[test]
    fn unknown_attribute_on_root_is_a_schema_error() {
        let xml = CONTACTS_AND_NONBOND.replace(
            "<OpenSMOGforces>",
            r#"<OpenSMOGforces units="kJ">"#,
        );
        let err = SmogXml::parse_str(&xml).unwrap_err();
        assert!(err.to_string().contains("unexpected attribute 'units' on <OpenSMOGforces>"));
    }

    #[test]
    fn malformed_xml_is_reported() {
        let xml = "<OpenSMOGforces><contacts></OpenSMOGforces>";
        assert!(matches!(SmogXml::parse_str(xml), Err(SmogXmlError::Xml(_))));
    }

    #[test]
    fn non_numeric_constant_is_a_schema_error() {
        let xml = r#"<OpenSMOGforces>
  <OpenSMOGminVersion>1.0</OpenSMOGminVersion>
  <constants><constant name="k" value="abc"/></constants>
  <contacts>
    <contacts_type name="c">
      <expression expr="k/r"/>
      <interaction i="1" j="2"/>
    </contacts_type>
  </contacts>
</OpenSMOGforces>"#;
        assert!(matches!(
            SmogXml::parse_str(xml),
            Err(SmogXmlError::Schema(_))
        ));
    }

    #[test]
    fn version_comparison_is_numeric() {
        assert!(version_newer_than("1.10", "1.9"));
        assert!(version_newer_than("2", "1.0.4"));
        assert!(!version_newer_than("1.0", "1.0.4"));
        assert!(!version_newer_than("1.0.4", "1.0.4"));
    }
}
