//! Static catalog of offered services

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceOffering {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

pub static SERVICE_CATALOG: &[ServiceOffering] = &[
    ServiceOffering {
        id: "gst",
        name: "GST Services",
        description: "Complete GST registration, filing, and compliance services",
        features: &["GST Registration", "Monthly Returns", "Annual Returns", "GST Audit"],
    },
    ServiceOffering {
        id: "income-tax",
        name: "Income Tax Services",
        description: "Professional income tax filing and planning services",
        features: &["ITR Filing", "Tax Planning", "TDS Returns", "Tax Audit"],
    },
    ServiceOffering {
        id: "business-incorporation",
        name: "Business Incorporation",
        description: "Complete business setup and incorporation services",
        features: &[
            "Company Registration",
            "Partnership Firm",
            "LLP Registration",
            "Sole Proprietorship",
        ],
    },
    ServiceOffering {
        id: "trademark",
        name: "Trademark Services",
        description: "Trademark registration and intellectual property protection",
        features: &["Trademark Search", "Registration", "Renewal", "Opposition"],
    },
    ServiceOffering {
        id: "compliance",
        name: "Compliance Services",
        description: "Ongoing compliance and regulatory services",
        features: &["ROC Compliance", "Labor Law", "Environmental", "FEMA"],
    },
    ServiceOffering {
        id: "mca",
        name: "MCA Services",
        description: "Ministry of Corporate Affairs related services",
        features: &["Annual Filing", "Board Resolutions", "Share Transfer", "Name Change"],
    },
];

pub fn is_known_service(id: &str) -> bool {
    SERVICE_CATALOG.iter().any(|s| s.id == id)
}
