//! Formative evaluation encoding.
//!
//! An entry stores its evaluation as one string, `"<technique>: <instrument>"`.
//! Parsing splits on the first colon only, so instruments may contain colons.

pub const SEPARATOR: char = ':';

pub const TECHNIQUES: &[(&str, &[&str])] = &[
    (
        "Observación",
        &[
            "Guía de observación",
            "Registro anecdótico",
            "Diario de clase",
            "Diario de trabajo",
            "Escala de actitudes",
        ],
    ),
    (
        "Desempeño de los alumnos",
        &[
            "Preguntas sobre el procedimiento",
            "Cuadernos de los alumnos",
            "Organizadores gráficos",
        ],
    ),
    (
        "Análisis del desempeño",
        &["Portafolio", "Rúbrica", "Lista de cotejo"],
    ),
    (
        "Interrogatorio",
        &[
            "Tipos textuales: debate y ensayo",
            "Tipos orales y escritos: pruebas escritas",
        ],
    ),
];

pub fn technique_names() -> Vec<&'static str> {
    TECHNIQUES.iter().map(|(t, _)| *t).collect()
}

pub fn instruments_for(technique: &str) -> &'static [&'static str] {
    TECHNIQUES
        .iter()
        .find(|(t, _)| *t == technique)
        .map(|(_, i)| *i)
        .unwrap_or(&[])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation<'a> {
    pub technique: &'a str,
    pub instrument: &'a str,
}

pub fn parse(evaluation: &str) -> Evaluation<'_> {
    match evaluation.split_once(SEPARATOR) {
        Some((technique, instrument)) => Evaluation {
            technique: technique.trim(),
            instrument: instrument.trim(),
        },
        None => Evaluation {
            technique: evaluation.trim(),
            instrument: "",
        },
    }
}

/// Instruments can only be chosen once a technique has been stored.
pub fn has_technique(evaluation: &str) -> bool {
    evaluation.contains(SEPARATOR)
}

/// Choosing a technique drops any instrument. An empty technique clears the
/// evaluation entirely.
pub fn with_technique(technique: &str) -> String {
    if technique.trim().is_empty() {
        return String::new();
    }
    format!("{}{} ", technique, SEPARATOR)
}

/// Rebuilds the string around the stored technique, replacing any prior
/// instrument. `None` while no technique is stored.
pub fn with_instrument(evaluation: &str, instrument: &str) -> Option<String> {
    let (technique, _) = evaluation.split_once(SEPARATOR)?;
    Some(format!("{}{} {}", technique, SEPARATOR, instrument))
}
