pub struct EmbeddedReference {
    pub reference_json: &'static str,
}

pub fn embedded_references() -> &'static [(&'static str, EmbeddedReference)] {
    &[
        (
            "edm",
            EmbeddedReference {
                reference_json: include_str!("../../references/edm.json"),
            },
        ),
        (
            "pop",
            EmbeddedReference {
                reference_json: include_str!("../../references/pop.json"),
            },
        ),
        (
            "rock",
            EmbeddedReference {
                reference_json: include_str!("../../references/rock.json"),
            },
        ),
    ]
}

pub fn embedded_reference(name: &str) -> Option<&'static str> {
    embedded_references()
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, r)| r.reference_json)
}
