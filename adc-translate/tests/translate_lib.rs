use adc_translate::context::{Context, EmptyInventory};
use adc_translate::translate_declaration;
use adc_translate::version::Version;
use decl_core::parse;
use pretty_assertions::assert_eq;

const DECLARATION: &str = r#"{
    "class": "ADC",
    "schemaVersion": "3.50.0",
    "t": {
        "class": "Tenant",
        "a": {
            "class": "Application",
            "cert": { "class": "Certificate", "certificate": "-----BEGIN CERTIFICATE-----", "privateKey": "-----BEGIN KEY-----" },
            "tls": { "class": "TLS_Server", "certificates": [{ "certificate": "cert" }] },
            "web": { "class": "Pool", "members": [{ "servicePort": 80, "serverAddresses": ["192.0.2.4", "192.0.2.5"] }] },
            "svc": {
                "class": "Service_HTTPS",
                "virtualAddresses": ["192.0.2.10"],
                "pool": "web",
                "serverTLS": "tls"
            }
        }
    }
}"#;

fn ctx() -> Context<'static> {
    Context::new(Version::parse("16.1"), &EmptyInventory)
}

#[test]
fn translation_does_not_mutate_the_declaration() {
    let decl = parse(DECLARATION.as_bytes()).expect("parse");
    let before = decl.clone();
    let outcome = translate_declaration(&ctx(), &decl);
    assert!(outcome.is_success());
    assert_eq!(decl, before);
}

#[test]
fn identical_input_gives_identical_output() {
    let decl = parse(DECLARATION.as_bytes()).expect("parse");
    let first = translate_declaration(&ctx(), &decl);
    let second = translate_declaration(&ctx(), &parse(DECLARATION.as_bytes()).expect("parse"));
    assert_eq!(first, second);
}

#[test]
fn https_service_emits_dependencies_before_virtuals() {
    let decl = parse(DECLARATION.as_bytes()).expect("parse");
    let outcome = translate_declaration(&ctx(), &decl);
    let paths: Vec<&str> = outcome.result.configs.iter().map(|c| c.path.as_str()).collect();
    let pos = |path: &str| {
        paths
            .iter()
            .position(|p| *p == path)
            .unwrap_or_else(|| panic!("missing {path} in {paths:?}"))
    };
    assert!(pos("/t/a/tls") < pos("/t/a/svc"));
    assert!(pos("/t/a/web") < pos("/t/a/svc"));
    assert!(pos("/t/a/svc") < pos("/t/a/svc-Redirect-"));
    let redirect = outcome.result.find("/t/a/svc-Redirect-").expect("redirect");
    assert_eq!(redirect.property_str("destination"), Some("/t/192.0.2.10:80"));
}
