use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// Fixed cost-category taxonomy.
///
/// Declaration order is display order. Classification order (which key wins
/// when a line names more than one category) is `MATCH_PRIORITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKey {
    Ruangan,
    Icu,
    Igd,
    PemeriksaanDokter,
    AsuhanKeperawatan,
    Tindakan,
    KamarOperasi,
    Laboratorium,
    Radiologi,
    Penunjang,
    SewaAlat,
    Obat,
    Bmhp,
    Administrasi,
}

/// How item-level and subtotal signals are reconciled into one amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStrategy {
    /// Sum of distinct subtotal lines (categories printed as several subsections).
    SumSummary,
    /// Largest subtotal (single-value categories such as room or ICU).
    MaxSummary,
    /// Item sum when it is larger than, but within 3x of, the subtotal sum.
    Hybrid,
}

impl ComponentKey {
    pub const ALL: [ComponentKey; 14] = [
        Self::Ruangan,
        Self::Icu,
        Self::Igd,
        Self::PemeriksaanDokter,
        Self::AsuhanKeperawatan,
        Self::Tindakan,
        Self::KamarOperasi,
        Self::Laboratorium,
        Self::Radiologi,
        Self::Penunjang,
        Self::SewaAlat,
        Self::Obat,
        Self::Bmhp,
        Self::Administrasi,
    ];

    /// More specific categories first: "KAMAR OPERASI" is surgery, not room;
    /// "SEWA ALKES" is equipment rental, not consumables.
    pub const MATCH_PRIORITY: [ComponentKey; 14] = [
        Self::KamarOperasi,
        Self::Icu,
        Self::Igd,
        Self::AsuhanKeperawatan,
        Self::PemeriksaanDokter,
        Self::Tindakan,
        Self::Laboratorium,
        Self::Radiologi,
        Self::Penunjang,
        Self::SewaAlat,
        Self::Bmhp,
        Self::Obat,
        Self::Administrasi,
        Self::Ruangan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ruangan => "ruangan",
            Self::Icu => "icu",
            Self::Igd => "igd",
            Self::PemeriksaanDokter => "pemeriksaan_dokter",
            Self::AsuhanKeperawatan => "asuhan_keperawatan",
            Self::Tindakan => "tindakan",
            Self::KamarOperasi => "kamar_operasi",
            Self::Laboratorium => "laboratorium",
            Self::Radiologi => "radiologi",
            Self::Penunjang => "penunjang",
            Self::SewaAlat => "sewa_alat",
            Self::Obat => "obat",
            Self::Bmhp => "bmhp",
            Self::Administrasi => "administrasi",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ruangan => "Ruangan",
            Self::Icu => "Ruang Intensif",
            Self::Igd => "IGD",
            Self::PemeriksaanDokter => "Pemeriksaan Dokter",
            Self::AsuhanKeperawatan => "Asuhan Keperawatan",
            Self::Tindakan => "Tindakan Medis",
            Self::KamarOperasi => "Kamar Operasi",
            Self::Laboratorium => "Laboratorium",
            Self::Radiologi => "Radiologi",
            Self::Penunjang => "Penunjang",
            Self::SewaAlat => "Sewa Alat",
            Self::Obat => "Obat",
            Self::Bmhp => "BMHP",
            Self::Administrasi => "Administrasi",
        }
    }

    /// Upper-case alias phrases. Matched on word boundaries; a trailing `*`
    /// makes the alias a word prefix (OCR often truncates long labels).
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Ruangan => &[
                "RUANGAN",
                "KAMAR",
                "AKOMODASI",
                "RAWAT INAP",
                "RUANG PERAWATAN",
                "SEWA KAMAR",
                "BED",
            ],
            Self::Icu => &["ICU", "ICCU", "NICU", "PICU", "HCU", "INTENSIVE CARE", "RUANG INTENSIF"],
            Self::Igd => &["IGD", "UGD", "GAWAT DARURAT", "EMERGENCY"],
            Self::PemeriksaanDokter => &[
                "PEMERIKSAAN DOKTER",
                "KONSULTASI",
                "KONSUL",
                "VISITE",
                "VISIT DOKTER",
                "JASA DOKTER",
                "JASA MEDIS",
                "DOKTER SPESIALIS",
                "DOKTER UMUM",
                "TINDAKAN DOKTER",
            ],
            Self::AsuhanKeperawatan => &[
                "ASUHAN KEPERAWATAN",
                "TINDAKAN KEPERAWATAN",
                "JASA PERAWAT",
                "KEPERAWATAN",
                "ASKEP",
            ],
            Self::Tindakan => &[
                "TINDAKAN MEDIS",
                "TINDAKAN MEDIK",
                "TINDAKAN NON OPERATIF",
                "TINDAKAN",
                "PROSEDUR",
            ],
            Self::KamarOperasi => &[
                "KAMAR OPERASI",
                "KAMAR BEDAH",
                "TINDAKAN OPERATIF",
                "OPERASI",
                "ANESTESI",
                "ANASTESI",
            ],
            Self::Laboratorium => &["LABORATORIUM", "LABORAT*", "LAB", "PATOLOGI KLINIK", "PATOLOGI"],
            Self::Radiologi => &[
                "RADIOLOGI",
                "RONTGEN",
                "X-RAY",
                "XRAY",
                "CT SCAN",
                "CT-SCAN",
                "MRI",
                "THORAX",
            ],
            Self::Penunjang => &[
                "PENUNJANG MEDIS",
                "PENUNJANG MEDIK",
                "PENUNJANG",
                "USG",
                "ECG",
                "EKG",
                "ECHO*",
                "FISIOTERAPI",
                "REHABILITASI MEDIK",
                "ENDOSKOPI",
            ],
            Self::SewaAlat => &[
                "SEWA ALAT",
                "SEWAALAT",
                "SEWA ALKES",
                "PEMAKAIAN ALAT",
                "SEWA MONITOR",
                "SEWA VENTILATOR",
            ],
            Self::Obat => &[
                "OBAT",
                "FARMASI",
                "MEDIKASI",
                "APOTIK",
                "APOTEK",
                "RESEP",
            ],
            Self::Bmhp => &[
                "BMHP",
                "BHP",
                "BAHAN MEDIS HABIS PAKAI",
                "BAHAN HABIS PAKAI",
                "ALKES",
                "ALAT KESEHATAN",
            ],
            Self::Administrasi => &["ADMINISTRASI", "ADM", "BIAYA ADMIN*", "MATERAI", "METERAI"],
        }
    }

    pub fn strategy(&self) -> ReconcileStrategy {
        match self {
            Self::Ruangan | Self::Icu | Self::Administrasi => ReconcileStrategy::MaxSummary,
            Self::PemeriksaanDokter
            | Self::AsuhanKeperawatan
            | Self::Laboratorium
            | Self::Radiologi
            | Self::Penunjang
            | Self::SewaAlat => ReconcileStrategy::SumSummary,
            Self::Igd | Self::Tindakan | Self::KamarOperasi | Self::Obat | Self::Bmhp => {
                ReconcileStrategy::Hybrid
            }
        }
    }
}

/// Which signal produced a component's amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    Summary,
    Items,
    Rescue,
}

/// One entry per category. `amount.is_some()` implies `found`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub label: String,
    pub found: bool,
    pub raw_evidence_line: Option<String>,
    pub amount: Option<i64>,
    pub source: Option<AmountSource>,
}

impl ComponentRecord {
    pub fn not_found(key: ComponentKey) -> Self {
        Self {
            label: key.label().to_string(),
            found: false,
            raw_evidence_line: None,
            amount: None,
            source: None,
        }
    }
}

pub type ComponentMap = BTreeMap<ComponentKey, ComponentRecord>;

/// Semantic field keys of the evidence payload: every category plus
/// auxiliary review fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Component(ComponentKey),
    Total,
    TimeIn,
    TimeOut,
    Coding,
    Diagnosis,
    Payer,
    Deposit,
    Cashier,
    Balance,
    EClaim,
}

impl FieldKey {
    pub const AUXILIARY: [FieldKey; 10] = [
        Self::Total,
        Self::TimeIn,
        Self::TimeOut,
        Self::Coding,
        Self::Diagnosis,
        Self::Payer,
        Self::Deposit,
        Self::Cashier,
        Self::Balance,
        Self::EClaim,
    ];

    pub fn all() -> Vec<FieldKey> {
        ComponentKey::ALL
            .iter()
            .map(|&k| Self::Component(k))
            .chain(Self::AUXILIARY)
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Component(k) => k.as_str(),
            Self::Total => "total",
            Self::TimeIn => "time_in",
            Self::TimeOut => "time_out",
            Self::Coding => "coding",
            Self::Diagnosis => "diagnosis",
            Self::Payer => "payer",
            Self::Deposit => "deposit",
            Self::Cashier => "cashier",
            Self::Balance => "balance",
            Self::EClaim => "e_claim",
        }
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// Matched directly against the field's keywords.
    Found,
    /// Derived indirectly (numeric component, total, paid or e-claim wording).
    Inferred,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceField {
    pub value: Option<String>,
    pub status: FieldStatus,
    /// Ranked best-first.
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeType {
    RawatInap,
    RawatJalan,
    Igd,
}

/// How the working segment was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeReport {
    pub segment_count: usize,
    pub group_count: usize,
    /// Zero-based index of the selected group.
    pub selected_group: usize,
    pub billing_id: Option<String>,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    pub name: Option<String>,
    pub episode_type: Option<EpisodeType>,
    pub total_raw: Option<String>,
    pub total_int: Option<i64>,
    pub billing_id: Option<String>,
    pub components: ComponentMap,
}

/// Consolidated review bundle for a downstream reviewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingBundle {
    pub schema_version: String,
    pub raw_text: String,
    pub raw_text_truncated: bool,
    pub raw_text_chars: usize,
    pub summary: BundleSummary,
    pub field_raw: BTreeMap<FieldKey, String>,
    pub field_status: BTreeMap<FieldKey, EvidenceField>,
    pub keyword_context: BTreeMap<FieldKey, Vec<String>>,
}

/// Coarse outcome, for callers that report partial success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Complete,
    PartialWithComponents,
    Partial,
    NothingFound,
}

/// Everything interpreted from one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedBillingFields {
    pub name: Option<String>,
    pub total_raw: Option<String>,
    pub total_int: Option<i64>,
    pub components: ComponentMap,
    pub payload: BTreeMap<FieldKey, String>,
    pub field_status: BTreeMap<FieldKey, EvidenceField>,
    pub episode: EpisodeReport,
    pub bundle: BillingBundle,
}

impl ParsedBillingFields {
    pub fn has_component_data(&self) -> bool {
        self.components.values().any(|c| c.found)
    }

    pub fn outcome(&self) -> ExtractionOutcome {
        match (self.name.is_some(), self.total_int.is_some(), self.has_component_data()) {
            (true, true, _) => ExtractionOutcome::Complete,
            (_, _, true) => ExtractionOutcome::PartialWithComponents,
            (false, false, false) => ExtractionOutcome::NothingFound,
            _ => ExtractionOutcome::Partial,
        }
    }
}
