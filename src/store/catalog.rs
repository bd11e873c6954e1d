//! Reference data shipped with the application

/// A builtin keyword framework, identified by a stable `key`
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    /// Stable framework identifier, independent of store row ids
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Grouping shown in the keyword list picker
    pub category: &'static str,
    pub groups: &'static [KeywordGroup],
}

/// A named group of terms inside a framework
#[derive(Debug, Clone, Copy)]
pub struct KeywordGroup {
    pub name: &'static str,
    pub terms: &'static [&'static str],
}

impl CatalogEntry {
    pub fn term_count(&self) -> usize {
        self.groups.iter().map(|group| group.terms.len()).sum()
    }
}

/// Builtin keyword frameworks. New entries may be appended in later
/// releases; existing keys must never be renamed.
pub const BUILTIN_KEYWORD_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "esg-core",
        name: "ESG Core",
        description: "General environmental, social and governance vocabulary",
        category: "sustainability",
        groups: &[
            KeywordGroup {
                name: "Environmental",
                terms: &[
                    "carbon emissions",
                    "greenhouse gas",
                    "renewable energy",
                    "biodiversity",
                    "water usage",
                    "waste management",
                ],
            },
            KeywordGroup {
                name: "Social",
                terms: &[
                    "human rights",
                    "diversity",
                    "employee wellbeing",
                    "community engagement",
                    "health and safety",
                ],
            },
            KeywordGroup {
                name: "Governance",
                terms: &[
                    "board independence",
                    "executive compensation",
                    "anti-corruption",
                    "shareholder rights",
                    "audit committee",
                ],
            },
        ],
    },
    CatalogEntry {
        key: "tcfd",
        name: "TCFD Recommendations",
        description: "Task Force on Climate-related Financial Disclosures pillars",
        category: "climate",
        groups: &[
            KeywordGroup {
                name: "Governance",
                terms: &["board oversight", "climate governance", "management role"],
            },
            KeywordGroup {
                name: "Strategy",
                terms: &[
                    "climate-related risks",
                    "climate-related opportunities",
                    "scenario analysis",
                    "transition plan",
                ],
            },
            KeywordGroup {
                name: "Risk Management",
                terms: &["risk identification", "risk assessment", "enterprise risk"],
            },
            KeywordGroup {
                name: "Metrics and Targets",
                terms: &["scope 1", "scope 2", "scope 3", "net zero", "emission targets"],
            },
        ],
    },
    CatalogEntry {
        key: "gri-universal",
        name: "GRI Universal Standards",
        description: "Reporting principles and general disclosures from GRI 1-3",
        category: "reporting",
        groups: &[
            KeywordGroup {
                name: "Reporting Principles",
                terms: &[
                    "materiality",
                    "stakeholder inclusiveness",
                    "sustainability context",
                    "completeness",
                ],
            },
            KeywordGroup {
                name: "General Disclosures",
                terms: &[
                    "organizational profile",
                    "reporting period",
                    "value chain",
                    "policy commitments",
                ],
            },
        ],
    },
    CatalogEntry {
        key: "un-sdg",
        name: "UN Sustainable Development Goals",
        description: "Headline themes of the seventeen SDGs",
        category: "sustainability",
        groups: &[
            KeywordGroup {
                name: "People",
                terms: &["no poverty", "zero hunger", "quality education", "gender equality"],
            },
            KeywordGroup {
                name: "Planet",
                terms: &[
                    "clean water",
                    "climate action",
                    "life below water",
                    "life on land",
                ],
            },
            KeywordGroup {
                name: "Prosperity",
                terms: &[
                    "decent work",
                    "economic growth",
                    "affordable and clean energy",
                    "reduced inequalities",
                ],
            },
        ],
    },
];

/// ISO 3166-1 alpha-2 code, name, region
pub const COUNTRIES: &[(&str, &str, &str)] = &[
    ("AR", "Argentina", "Americas"),
    ("AU", "Australia", "Oceania"),
    ("AT", "Austria", "Europe"),
    ("BE", "Belgium", "Europe"),
    ("BR", "Brazil", "Americas"),
    ("CA", "Canada", "Americas"),
    ("CL", "Chile", "Americas"),
    ("CN", "China", "Asia"),
    ("CO", "Colombia", "Americas"),
    ("DK", "Denmark", "Europe"),
    ("EG", "Egypt", "Africa"),
    ("FI", "Finland", "Europe"),
    ("FR", "France", "Europe"),
    ("DE", "Germany", "Europe"),
    ("IN", "India", "Asia"),
    ("ID", "Indonesia", "Asia"),
    ("IE", "Ireland", "Europe"),
    ("IT", "Italy", "Europe"),
    ("JP", "Japan", "Asia"),
    ("KE", "Kenya", "Africa"),
    ("KR", "South Korea", "Asia"),
    ("MX", "Mexico", "Americas"),
    ("NL", "Netherlands", "Europe"),
    ("NZ", "New Zealand", "Oceania"),
    ("NG", "Nigeria", "Africa"),
    ("NO", "Norway", "Europe"),
    ("PL", "Poland", "Europe"),
    ("PT", "Portugal", "Europe"),
    ("SA", "Saudi Arabia", "Asia"),
    ("SG", "Singapore", "Asia"),
    ("ZA", "South Africa", "Africa"),
    ("ES", "Spain", "Europe"),
    ("SE", "Sweden", "Europe"),
    ("CH", "Switzerland", "Europe"),
    ("AE", "United Arab Emirates", "Asia"),
    ("GB", "United Kingdom", "Europe"),
    ("US", "United States", "Americas"),
];

/// Industry name and sector
pub const INDUSTRIES: &[(&str, &str)] = &[
    ("Oil & Gas", "Energy"),
    ("Renewable Energy", "Energy"),
    ("Utilities", "Utilities"),
    ("Mining", "Materials"),
    ("Chemicals", "Materials"),
    ("Construction", "Industrials"),
    ("Aerospace & Defense", "Industrials"),
    ("Transportation & Logistics", "Industrials"),
    ("Automotive", "Consumer Discretionary"),
    ("Retail", "Consumer Discretionary"),
    ("Food & Beverage", "Consumer Staples"),
    ("Agriculture", "Consumer Staples"),
    ("Pharmaceuticals", "Health Care"),
    ("Medical Devices", "Health Care"),
    ("Banking", "Financials"),
    ("Insurance", "Financials"),
    ("Asset Management", "Financials"),
    ("Real Estate", "Real Estate"),
    ("Software", "Information Technology"),
    ("Semiconductors", "Information Technology"),
    ("Telecommunications", "Communication Services"),
    ("Media & Entertainment", "Communication Services"),
];

/// Global settings inserted when their key is absent
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("theme", "system"),
    ("default_ngram_size", "2"),
    ("ngram_min_frequency", "3"),
    ("keyword_match_mode", "whole_word"),
    ("auto_extract_metadata", "true"),
];
