//! Snapshot tests
//!
//! Loads each *.hcl file in /tests/fixtures/ individually and compares the resource bodies once references are
//! applied.
use hclconfig::fqrn::Fqrn;
use hclconfig::hcl_documents::HclDocuments;
use hclconfig::lookup::Navigator;
use hclconfig::registry::Registry;
use hclconfig::resource::{self, ResourceSet};
use hclconfig::schema::{self, DynamicValue, SchemaNode};
use hclconfig::types::{StructType, Type, Typed};
use hclconfig::value::Value;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn documents(name: &str) -> HclDocuments {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);

    let mut documents = HclDocuments::default();
    documents.load_file(&path).expect("fixture must load");
    documents
}

fn resources(name: &str) -> ResourceSet {
    documents(name)
        .resources(&Registry::default())
        .expect("must be valid resources")
}

fn resolve(set: &ResourceSet, reference: &str) -> Value {
    set.resolve(
        &Fqrn::parse(reference).expect("valid reference"),
        &Navigator::new().with_alias("hcl"),
    )
    .expect("reference must resolve")
}

/// Bodies of all resources once references are applied
#[derive(serde::Serialize)]
struct Applied {
    resources: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unresolved: Vec<String>,
}

#[test]
fn snapshots() {
    insta::glob!("fixtures/*.hcl", |path| {
        let mut documents = HclDocuments::default();
        documents.load_file(path).unwrap();

        let mut set = documents
            .resources(&Registry::default())
            .expect("fixtures are valid resources");
        for resource in set.iter() {
            assert_eq!(resource.meta.file.as_deref(), Some(path.canonicalize().unwrap().as_path()));
        }

        let unresolved = match set.apply_references(&Navigator::new()) {
            Ok(_) => vec![],
            Err(resource::Error::Unresolved(unresolved)) => unresolved,
            Err(err) => panic!("unexpected failure: {err}"),
        };
        let applied = Applied {
            resources: set
                .iter()
                .map(|resource| (resource.fqrn().to_string(), resource.body.clone()))
                .collect(),
            unresolved,
        };

        insta::assert_json_snapshot!(applied);
    });
}

#[test]
fn containers() {
    let mut set = resources("containers.hcl");
    set.apply_references(&Navigator::new()).unwrap();

    insta::assert_json_snapshot!(resolve(&set, "output.web"), @r###"
    {
      "image": "nginx:1.25",
      "ports": [
        80,
        443
      ],
      "network": "a",
      "env": {
        "MODE": "production"
      }
    }
    "###);

    assert_eq!(
        resolve(&set, "local.cidrs"),
        Value::from(vec!["10.0.1.0/24", "10.0.2.0/24"])
    );
    assert_eq!(
        resolve(&set, "resource.network.main.subnet.name"),
        Value::from(vec!["a", "b"])
    );
    assert_eq!(
        resolve(&set, "resource.network.main.subnet[1].cidr"),
        Value::from("10.0.2.0/24")
    );
}

#[test]
fn dependencies_are_recorded() {
    let set = resources("containers.hcl");

    let web = set
        .find(&Fqrn::parse("resource.container.web").unwrap())
        .unwrap();
    assert_eq!(
        web.meta.depends_on,
        vec!["variable.image", "resource.network.main"]
    );

    let output = set.find(&Fqrn::parse("output.web").unwrap()).unwrap();
    assert_eq!(output.meta.depends_on, vec!["resource.container.web"]);
}

#[test]
fn cycles() {
    let mut set = resources("cycle.hcl");

    assert_eq!(
        set.apply_references(&Navigator::new()),
        Err(resource::Error::Unresolved(vec![
            "local.one -> local.two".into(),
            "local.two -> local.one".into(),
        ]))
    );
    assert_eq!(resolve(&set, "local.three"), Value::from("fine"));
}

/// A resource type owned by another process
#[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
struct Container {
    image: String,
    ports: Vec<u16>,
    network: Option<String>,
    env: std::collections::BTreeMap<String, String>,
}

impl Typed for Container {
    fn type_of() -> Type {
        StructType::new("Container")
            .field("Image", r#"hcl:"image" json:"image""#, String::type_of())
            .field("Ports", r#"hcl:"ports,optional" json:"ports""#, Vec::<u16>::type_of())
            .field("Network", r#"hcl:"network,optional" json:"network""#, Option::<String>::type_of())
            .field(
                "Env",
                r#"hcl:"env,optional" json:"env""#,
                std::collections::BTreeMap::<String, String>::type_of(),
            )
            .into()
    }
}

#[test]
fn schema_exchange() {
    // owner side
    let exported = serde_json::to_string(&schema::describe_typed::<Container>(None).unwrap()).unwrap();

    // host side, no knowledge of `Container`
    let received: SchemaNode = serde_json::from_str(&exported).unwrap();
    let mut registry = Registry::default();
    registry.register_schema("container", &received).unwrap();

    let mut set = documents("containers.hcl").resources(&registry).unwrap();
    let navigator = Navigator::new().with_alias("hcl");
    set.apply_references(&navigator).unwrap();

    let web = set
        .find(&Fqrn::parse("resource.container.web").unwrap())
        .unwrap();
    let populated = DynamicValue::new(
        registry.template("container").unwrap().clone(),
        web.body.clone(),
    )
    .unwrap();
    let document = populated.to_json().unwrap();

    // back on the owner side
    let container: Container =
        schema::exchange(&DynamicValue::from_json(Container::type_of(), document).unwrap()).unwrap();
    assert_eq!(
        container,
        Container {
            image: "nginx:1.25".into(),
            ports: vec![80, 443],
            network: Some("a".into()),
            env: [("MODE".to_string(), "production".to_string())].into(),
        }
    );
}
