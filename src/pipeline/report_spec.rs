//! Declarative report layouts.
//!
//! A [`ReportSpec`] says which output columns a report has, in which order,
//! and how each one is derived from the raw query row. One generic pipeline
//! runs every report; adding a report means registering a spec.

use std::collections::HashMap;

use crate::constants::{
    DEFAULT_SLOT_COUNT, NO_CLIENT_SENTINEL, NO_SERVICE_SENTINEL, OPERATION_REPORTS_REPORT,
    OPERATION_REPORTS_V2_REPORT, SERVICES_REPORTS_REPORT, SERVICE_EXECUTIONS_REPORT,
    UNASSIGNED_SENTINEL,
};
use crate::pipeline::processing::pivot::SlotPart;

/// How one output column is derived from the parent row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRule {
    /// Raw value copied verbatim.
    PassThrough { source: String },
    /// Raw value coerced to text.
    Text { source: String },
    Date { source: String },
    TimeOfDay { source: String },
    Duration { source: String },
    /// Value resolved through a joined lookup; an unresolved lookup shows
    /// `sentinel` instead of null.
    Lookup { source: String, sentinel: String },
    /// Declared but intentionally left empty.
    Blank,
    /// One part of the child in a 1-based slot.
    Slot { position: usize, part: SlotPart },
    /// Payload of the rank-1 child.
    Primary,
}

impl ColumnRule {
    pub fn pass_through(source: &str) -> Self {
        ColumnRule::PassThrough { source: source.to_string() }
    }

    pub fn text(source: &str) -> Self {
        ColumnRule::Text { source: source.to_string() }
    }

    pub fn date(source: &str) -> Self {
        ColumnRule::Date { source: source.to_string() }
    }

    pub fn time_of_day(source: &str) -> Self {
        ColumnRule::TimeOfDay { source: source.to_string() }
    }

    pub fn duration(source: &str) -> Self {
        ColumnRule::Duration { source: source.to_string() }
    }

    pub fn lookup(source: &str, sentinel: &str) -> Self {
        ColumnRule::Lookup {
            source: source.to_string(),
            sentinel: sentinel.to_string(),
        }
    }

    /// Whether the rule reads slot data.
    pub fn uses_pivot(&self) -> bool {
        matches!(self, ColumnRule::Slot { .. } | ColumnRule::Primary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub rule: ColumnRule,
}

impl ColumnSpec {
    pub fn new(name: &str, rule: ColumnRule) -> Self {
        Self {
            name: name.to_string(),
            rule,
        }
    }
}

/// How child rows are matched to parents and ranked into slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotSpec {
    /// Group key columns on the parent row.
    pub parent_key: [String; 2],
    /// Group key columns on the child row.
    pub child_key: [String; 2],
    pub rank_column: String,
    pub payload_column: String,
    pub slot_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSpec {
    pub name: String,
    pub description: String,
    pub columns: Vec<ColumnSpec>,
    pub pivot: Option<PivotSpec>,
}

impl ReportSpec {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Layout of the service execution listing.
    pub fn service_executions() -> Self {
        let mut columns: Vec<ColumnSpec> = [
            "id",
            "id_service",
            "id_client",
            "id_company",
            "fuselage_type",
            "id_avion",
            "id_user",
            "work_order",
            "whonew",
            "create_at",
            "updated_at",
        ]
        .iter()
        .map(|c| ColumnSpec::new(c, ColumnRule::pass_through(c)))
        .collect();
        columns.push(ColumnSpec::new("service_name", ColumnRule::text("service_name")));
        for blank in ["client_name", "company_name", "aircraft_model"] {
            columns.push(ColumnSpec::new(blank, ColumnRule::Blank));
        }

        Self {
            name: SERVICE_EXECUTIONS_REPORT.to_string(),
            description: "Service executions with their catalog service name".to_string(),
            columns,
            pivot: None,
        }
    }

    /// Layout of the operation report with resolved client, service and
    /// technician names.
    pub fn operation_reports() -> Self {
        Self {
            name: OPERATION_REPORTS_REPORT.to_string(),
            description: "Operation report with resolved names".to_string(),
            columns: vec![
                ColumnSpec::new("id", ColumnRule::pass_through("id")),
                ColumnSpec::new("cliente", ColumnRule::lookup("cliente", NO_CLIENT_SENTINEL)),
                ColumnSpec::new("fuselage_type", ColumnRule::pass_through("fuselage_type")),
                ColumnSpec::new(
                    "servicio_principal",
                    ColumnRule::lookup("servicio_principal", NO_SERVICE_SENTINEL),
                ),
                ColumnSpec::new("fecha", ColumnRule::text("fecha")),
                ColumnSpec::new("work_order", ColumnRule::pass_through("work_order")),
                ColumnSpec::new(
                    "tecnico_asignado",
                    ColumnRule::lookup("tecnico_asignado", UNASSIGNED_SENTINEL),
                ),
            ],
            pivot: None,
        }
    }

    /// Layout of the per-flight operation report with six service slots.
    pub fn operation_reports_v2() -> Self {
        let mut columns = vec![
            ColumnSpec::new("COMPANY", ColumnRule::text("COMPANY")),
            ColumnSpec::new("AIRLINE", ColumnRule::text("AIRLINE")),
            ColumnSpec::new("DATE", ColumnRule::date("DATE")),
            ColumnSpec::new("STATION", ColumnRule::text("STATION")),
            ColumnSpec::new("AC_REG", ColumnRule::text("AC REG")),
            // Column name kept as consumers know it.
            ColumnSpec::new("FLIGTH", ColumnRule::text("FLIGTH")),
            ColumnSpec::new("DEST", ColumnRule::text("DEST")),
            ColumnSpec::new("LOG_BOOK", ColumnRule::text("LOG BOOK")),
            ColumnSpec::new("AC_TYPE", ColumnRule::text("A/C TYPE")),
            ColumnSpec::new("SERV_PR", ColumnRule::Primary),
            ColumnSpec::new("ASSISTANT_TYPE", ColumnRule::text("ASSISTANT TYPE")),
            ColumnSpec::new("AOG", ColumnRule::text("AOG")),
            ColumnSpec::new("START_TIME", ColumnRule::time_of_day("START TIME")),
            ColumnSpec::new("END_TIME", ColumnRule::time_of_day("END TIME")),
            ColumnSpec::new(
                "TOTAL_TECHNICIAN_TIME",
                ColumnRule::duration("TOTAL TECHNICIAN TIME"),
            ),
        ];
        for position in 1..=DEFAULT_SLOT_COUNT {
            columns.push(ColumnSpec {
                name: format!("SERV{position}"),
                rule: ColumnRule::Slot {
                    position,
                    part: SlotPart::Rank,
                },
            });
        }
        columns.push(ColumnSpec::new("REMARKS", ColumnRule::text("REMARKS")));
        columns.push(ColumnSpec::new("TECHNICIAN", ColumnRule::text("TECHNICIAN")));

        Self {
            name: OPERATION_REPORTS_V2_REPORT.to_string(),
            description: "Operation report per technician and flight with service slots"
                .to_string(),
            columns,
            pivot: Some(PivotSpec {
                parent_key: ["id_sale_employee".to_string(), "id_sale_flight".to_string()],
                child_key: ["id_sale_employee".to_string(), "id_sale_flight".to_string()],
                rank_column: "service_name".to_string(),
                payload_column: "service_description".to_string(),
                slot_count: DEFAULT_SLOT_COUNT,
            }),
        }
    }

    /// Layout of the one-row-per-service report.
    pub fn services_reports() -> Self {
        Self {
            name: SERVICES_REPORTS_REPORT.to_string(),
            description: "One row per executed service".to_string(),
            columns: vec![
                ColumnSpec::new("COMPANY", ColumnRule::text("COMPANY")),
                ColumnSpec::new("LLAVE", ColumnRule::text("LLAVE")),
                ColumnSpec::new("AIRLINE", ColumnRule::text("AIRLINE")),
                ColumnSpec::new("DATE", ColumnRule::date("DATE")),
                ColumnSpec::new("STATION", ColumnRule::text("STATION")),
                ColumnSpec::new("AC_REG", ColumnRule::text("AC_REG")),
                ColumnSpec::new("FLIGHT", ColumnRule::text("FLIGHT")),
                ColumnSpec::new("AC_TYPE", ColumnRule::text("AC_TYPE")),
                ColumnSpec::new("ASSISTANT_TYPE", ColumnRule::text("ASSISTANT TYPE")),
                ColumnSpec::new("AOG", ColumnRule::text("AOG")),
                ColumnSpec::new("START_TIME", ColumnRule::time_of_day("START_TIME")),
                ColumnSpec::new("END_TIME", ColumnRule::time_of_day("END_TIME")),
                ColumnSpec::new("ON_GND", ColumnRule::duration("TOTAL TECHNICIAN TIME")),
                ColumnSpec::new("SERVICE", ColumnRule::text("SERVICE")),
                ColumnSpec::new("WORK_REFERENCE", ColumnRule::text("WORK_REFERENCE")),
                ColumnSpec::new("TECHNICIAN", ColumnRule::text("TECHNICIAN")),
            ],
            pivot: None,
        }
    }
}

/// Registry of report layouts by name
pub struct ReportRegistry {
    reports: HashMap<String, ReportSpec>,
}

impl ReportRegistry {
    /// Create a new registry with the built-in reports
    pub fn new() -> Self {
        let mut registry = Self {
            reports: HashMap::new(),
        };
        registry.register(ReportSpec::service_executions());
        registry.register(ReportSpec::operation_reports());
        registry.register(ReportSpec::operation_reports_v2());
        registry.register(ReportSpec::services_reports());
        registry
    }

    /// Register a report, replacing any report of the same name
    pub fn register(&mut self, spec: ReportSpec) {
        self.reports.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ReportSpec> {
        self.reports.get(name)
    }

    /// List all registered report names, sorted
    pub fn list_reports(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.reports.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ReportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
