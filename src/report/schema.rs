// Maps the headers of the input files onto the fields of the engine.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::report::*;

/// A column that the readers know how to find in a file.
pub trait SchemaField: Copy + Ord + Debug + 'static {
    /// The key of the column in the configuration file.
    fn key(&self) -> &'static str;
    /// The headers under which the column usually appears.
    fn aliases(&self) -> &'static [&'static str];
}

impl SchemaField for VisitField {
    fn key(&self) -> &'static str {
        match self {
            VisitField::ProjectCode => "projectCode",
            VisitField::Client => "client",
            VisitField::Wave => "wave",
            VisitField::Region => "region",
            VisitField::Dsm => "dsm",
            VisitField::Asm => "asm",
            VisitField::Rs => "rs",
            VisitField::Status => "status",
            VisitField::VisitDate => "visitDate",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            VisitField::ProjectCode => &["Код анкеты", "Код проекта", "project code", "project"],
            VisitField::Client => &["Имя клиента", "Клиент", "client"],
            VisitField::Wave => &["Название проекта", "Название волны", "Волна", "wave"],
            VisitField::Region => &["Регион", "region"],
            VisitField::Dsm => &["ЗОД", "DSM"],
            VisitField::Asm => &["АСС", "ASM"],
            VisitField::Rs => &["ЭМ", "RS"],
            VisitField::Status => &["Статус", "Статус визита", "status"],
            VisitField::VisitDate => &["Дата визита", "visit date", "date"],
        }
    }
}

/// The columns of the project registry.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum RegistryField {
    ProjectCode,
    Portal,
    StartDate,
    EndDate,
    Client,
    Wave,
}

impl RegistryField {
    pub const ALL: [RegistryField; 6] = [
        RegistryField::ProjectCode,
        RegistryField::Portal,
        RegistryField::StartDate,
        RegistryField::EndDate,
        RegistryField::Client,
        RegistryField::Wave,
    ];
}

impl SchemaField for RegistryField {
    fn key(&self) -> &'static str {
        match self {
            RegistryField::ProjectCode => "projectCode",
            RegistryField::Portal => "portal",
            RegistryField::StartDate => "startDate",
            RegistryField::EndDate => "endDate",
            RegistryField::Client => "client",
            RegistryField::Wave => "wave",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            RegistryField::ProjectCode => &[
                "Код проекта RU00.000.00.01SVZ24",
                "Код проекта",
                "project code",
                "project",
            ],
            RegistryField::Portal => &["Портал", "Источник", "portal"],
            RegistryField::StartDate => &["Дата старта", "start date", "start"],
            // The extended end date comes first when both are present.
            RegistryField::EndDate => &[
                "Дата финиша с продлением",
                "Дата финиша",
                "end date",
                "end",
            ],
            RegistryField::Client => &["Проекты в https://ru.checker-soft.com", "client"],
            RegistryField::Wave => &["Название волны на Чекере/ином ПО", "wave"],
        }
    }
}

/// Trims a header, collapses its inner whitespace and lowers its case.
pub fn normalize_header(h: &str) -> String {
    h.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

/// Where each field sits in a file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnMap<F: SchemaField> {
    pub indices: BTreeMap<F, usize>,
    pub missing: Vec<F>,
}

impl<F: SchemaField> ColumnMap<F> {
    pub fn get(&self, field: F) -> Option<usize> {
        self.indices.get(&field).cloned()
    }

    pub fn contains(&self, field: F) -> bool {
        self.indices.contains_key(&field)
    }
}

/// Finds the column of each field among the headers.
///
/// The overrides map a column key to a header, and replace the usual aliases
/// of that field. An override with an unknown key is an error.
pub fn resolve_columns<F: SchemaField>(
    headers: &[String],
    fields: &[F],
    overrides: Option<&BTreeMap<String, String>>,
) -> ReportResult<ColumnMap<F>> {
    if let Some(ovs) = overrides {
        for k in ovs.keys() {
            if !fields.iter().any(|f| f.key() == k.as_str()) {
                whatever!("unknown column key in the configuration: {}", k);
            }
        }
    }

    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut indices: BTreeMap<F, usize> = BTreeMap::new();
    let mut missing: Vec<F> = Vec::new();
    for field in fields.iter() {
        let candidates: Vec<String> = match overrides.and_then(|o| o.get(field.key())) {
            Some(h) => vec![normalize_header(h)],
            None => std::iter::once(field.key())
                .chain(field.aliases().iter().cloned())
                .map(normalize_header)
                .collect(),
        };
        // The order of the candidates gives the preference.
        let idx = candidates
            .iter()
            .find_map(|c| normalized.iter().position(|h| h == c));
        match idx {
            Some(i) => {
                debug!("resolve_columns: {:?} -> {:?} (column {})", field, headers[i], i);
                indices.insert(*field, i);
            }
            None => {
                debug!("resolve_columns: {:?}: no column among {:?}", field, candidates);
                missing.push(*field);
            }
        }
    }
    Ok(ColumnMap { indices, missing })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(hs: &[&str]) -> Vec<String> {
        hs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn russian_headers() {
        let hs = headers(&[
            "Код анкеты",
            "Имя клиента",
            "Название проекта",
            "Регион",
            "ЗОД",
            "АСС",
            "ЭМ",
            "Статус",
            "Дата визита",
        ]);
        let m = resolve_columns(&hs, &VisitField::ALL, None).unwrap();
        assert!(m.missing.is_empty());
        assert_eq!(m.get(VisitField::ProjectCode), Some(0));
        assert_eq!(m.get(VisitField::Rs), Some(6));
        assert_eq!(m.get(VisitField::VisitDate), Some(8));
    }

    #[test]
    fn spaces_and_case() {
        let hs = headers(&["  PROJECT   CODE ", "Проекты в  https://ru.checker-soft.com"]);
        let m = resolve_columns(&hs, &RegistryField::ALL, None).unwrap();
        assert_eq!(m.get(RegistryField::ProjectCode), Some(0));
        assert_eq!(m.get(RegistryField::Client), Some(1));
        assert!(m.missing.contains(&RegistryField::Portal));
        assert!(!m.contains(RegistryField::StartDate));
    }

    #[test]
    fn extended_end_date_is_preferred() {
        let hs = headers(&["Дата финиша", "Дата финиша с продлением"]);
        let m = resolve_columns(&hs, &RegistryField::ALL, None).unwrap();
        assert_eq!(m.get(RegistryField::EndDate), Some(1));
    }

    #[test]
    fn overrides() {
        let hs = headers(&["Мерчендайзер", "ЭМ"]);
        let mut ovs = BTreeMap::new();
        ovs.insert("rs".to_string(), "мерчендайзер".to_string());
        let m = resolve_columns(&hs, &[VisitField::Rs], Some(&ovs)).unwrap();
        assert_eq!(m.get(VisitField::Rs), Some(0));

        ovs.insert("merch".to_string(), "ЭМ".to_string());
        assert!(resolve_columns(&hs, &[VisitField::Rs], Some(&ovs)).is_err());
    }

    #[test]
    fn missing_columns() {
        let hs = headers(&["Код анкеты"]);
        let m = resolve_columns(&hs, &VisitField::ALL, None).unwrap();
        assert_eq!(m.missing.len(), 8);
        assert!(m.missing.contains(&VisitField::Rs));
    }
}
