//! Fixed HL7 code tables used to render descriptions next to codes.
//!
//! Lookups never fail: an unknown code is returned as its own description.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodeTable {
    /// HL7 table 0001.
    AdministrativeSex,
    /// HL7 table 0004.
    PatientClass,
    /// HL7 table 0038.
    OrderStatus,
    /// HL7 table 0027.
    Priority,
    /// HL7 table 0162.
    Route,
    UnitsOfMeasure,
    MedicationForm,
}

impl CodeTable {
    pub const ALL: [CodeTable; 7] = [
        CodeTable::AdministrativeSex,
        CodeTable::PatientClass,
        CodeTable::OrderStatus,
        CodeTable::Priority,
        CodeTable::Route,
        CodeTable::UnitsOfMeasure,
        CodeTable::MedicationForm,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CodeTable::AdministrativeSex => "administrative_sex",
            CodeTable::PatientClass => "patient_class",
            CodeTable::OrderStatus => "order_status",
            CodeTable::Priority => "priority",
            CodeTable::Route => "route",
            CodeTable::UnitsOfMeasure => "units_of_measure",
            CodeTable::MedicationForm => "medication_form",
        }
    }

    const fn entries(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CodeTable::AdministrativeSex => &[
                ("M", "Male"),
                ("F", "Female"),
                ("U", "Unknown"),
                ("A", "Ambiguous"),
                ("N", "Not applicable"),
                ("O", "Other"),
            ],
            CodeTable::PatientClass => &[
                ("E", "Emergency"),
                ("I", "Inpatient"),
                ("O", "Outpatient"),
                ("P", "Preadmit"),
                ("R", "Recurring patient"),
                ("B", "Obstetrics"),
                ("C", "Commercial Account"),
                ("N", "Not Applicable"),
                ("U", "Unknown"),
            ],
            CodeTable::OrderStatus => &[
                ("A", "Some, but not all, results available"),
                ("CA", "Order was canceled"),
                ("CM", "Order is completed"),
                ("DC", "Order was discontinued"),
                ("ER", "Error, order not found"),
                ("HD", "Order is on hold"),
                ("IP", "In process, unspecified"),
                ("RP", "Order has been replaced"),
                ("SC", "In process, scheduled"),
            ],
            CodeTable::Priority => &[
                ("S", "Stat"),
                ("A", "ASAP"),
                ("R", "Routine"),
                ("P", "Preoperative"),
                ("C", "Callback"),
                ("T", "Timing critical"),
            ],
            CodeTable::Route => &[
                ("PO", "Oral"),
                ("IV", "Intravenous"),
                ("IM", "Intramuscular"),
                ("SC", "Subcutaneous"),
                ("INH", "Inhalation"),
                ("TOP", "Topical"),
                ("PR", "Rectal"),
                ("PV", "Vaginal"),
                ("SL", "Sublingual"),
                ("BUCC", "Buccal"),
                ("NAS", "Nasal"),
                ("OPH", "Ophthalmic"),
                ("OT", "Otic"),
                ("TD", "Transdermal"),
                ("NG", "Nasogastric"),
                ("GT", "Gastrostomy tube"),
            ],
            CodeTable::UnitsOfMeasure => &[
                ("TAB", "Tablet"),
                ("CAP", "Capsule"),
                ("ML", "Milliliter"),
                ("MG", "Milligram"),
                ("G", "Gram"),
                ("MCG", "Microgram"),
                ("L", "Liter"),
                ("CM", "Centimeter"),
                ("KG", "Kilogram"),
                ("MEQ", "Milliequivalent"),
                ("IU", "International Unit"),
                ("HR", "Hour"),
                ("DAY", "Day"),
                ("WK", "Week"),
                ("MO", "Month"),
            ],
            CodeTable::MedicationForm => &[
                ("TAB", "Tablet"),
                ("CAP", "Capsule"),
                ("SYR", "Syrup"),
                ("SUS", "Suspension"),
                ("INJ", "Injection"),
                ("CRE", "Cream"),
                ("OIN", "Ointment"),
                ("SUP", "Suppository"),
                ("SOL", "Solution"),
                ("POW", "Powder"),
                ("GEL", "Gel"),
                ("LOT", "Lotion"),
                ("AER", "Aerosol"),
                ("PAS", "Paste"),
                ("FIL", "Film"),
                ("IMP", "Implant"),
            ],
        }
    }
}

impl FromStr for CodeTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodeTable::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown code table '{s}'"))
    }
}

static TABLES: LazyLock<HashMap<CodeTable, HashMap<&'static str, &'static str>>> =
    LazyLock::new(|| {
        CodeTable::ALL
            .into_iter()
            .map(|table| (table, table.entries().iter().copied().collect()))
            .collect()
    });

/// Description for `code`, if the table knows it.
pub fn lookup(table: CodeTable, code: &str) -> Option<&'static str> {
    TABLES.get(&table).and_then(|t| t.get(code)).copied()
}

/// Description for `code`, falling back to the code itself.
pub fn describe(table: CodeTable, code: &str) -> &str {
    lookup(table, code).unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_known_codes() {
        assert_eq!(describe(CodeTable::Route, "PO"), "Oral");
        assert_eq!(describe(CodeTable::MedicationForm, "TAB"), "Tablet");
        assert_eq!(describe(CodeTable::AdministrativeSex, "F"), "Female");
        assert_eq!(describe(CodeTable::Priority, "S"), "Stat");
    }

    #[test]
    fn unknown_codes_fall_back_to_raw_code() {
        assert_eq!(describe(CodeTable::Route, "XYZ"), "XYZ");
        assert_eq!(lookup(CodeTable::MedicationForm, "PATCH"), None);
    }

    #[test]
    fn tables_parse_from_names() {
        for table in CodeTable::ALL {
            assert_eq!(table.as_str().parse::<CodeTable>(), Ok(table));
        }
        assert!("nope".parse::<CodeTable>().is_err());
    }

    #[test]
    fn same_code_differs_between_tables() {
        assert_eq!(describe(CodeTable::Route, "SC"), "Subcutaneous");
        assert_eq!(describe(CodeTable::OrderStatus, "SC"), "In process, scheduled");
    }
}
