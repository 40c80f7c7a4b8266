//! 评估表单状态 - 流程层
//!
//! 保存 11 个评估字段的当前取值，执行联动规则，
//! 判断默认（通过）/偏离（驳回），并生成驳回理由和提交数据

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{FieldId, FormOptions, SubmissionPayload, Task};

/// 序列号覆盖值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialOverride {
    /// 置为 "-"
    Dash,
    /// 恢复为任务原始序列号
    Original,
}

/// 规则触发条件（针对触发字段的新值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    OneOf(&'static [&'static str]),
    NotOneOf(&'static [&'static str]),
}

impl Condition {
    fn matches(&self, value: &str) -> bool {
        match self {
            Condition::OneOf(values) => values.contains(&value),
            Condition::NotOneOf(values) => !values.contains(&value),
        }
    }
}

/// 规则效果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// 把目标字段设为固定值
    Set(FieldId, &'static str),
    /// 把目标字段设为触发字段的新值
    Mirror(FieldId),
    SerialOverride(SerialOverride),
}

/// 一条联动规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeRule {
    pub trigger: FieldId,
    pub condition: Condition,
    pub effects: &'static [Effect],
}

const O_KEEPS_SERIAL: &[&str] = &["Ada", "Tidak sesuai"];

/// 联动规则表
///
/// 只对操作员直接修改的字段求值，联动产生的修改不会再次触发规则
pub static CASCADE_RULES: &[CascadeRule] = &[
    CascadeRule {
        trigger: FieldId::Q,
        condition: Condition::OneOf(&["Tidak ada", "Tidak terlihat jelas"]),
        effects: &[
            Effect::Mirror(FieldId::O),
            Effect::SerialOverride(SerialOverride::Dash),
        ],
    },
    CascadeRule {
        trigger: FieldId::R,
        condition: Condition::OneOf(&["Tidak ada"]),
        effects: &[
            Effect::Set(FieldId::T, "Tidak ada"),
            Effect::Set(FieldId::F, "Tidak ada"),
            Effect::Set(FieldId::S, "TTD tidak ada"),
        ],
    },
    CascadeRule {
        trigger: FieldId::O,
        condition: Condition::OneOf(O_KEEPS_SERIAL),
        effects: &[Effect::SerialOverride(SerialOverride::Original)],
    },
    CascadeRule {
        trigger: FieldId::O,
        condition: Condition::NotOneOf(O_KEEPS_SERIAL),
        effects: &[Effect::SerialOverride(SerialOverride::Dash)],
    },
];

static PHRASES_G: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak sesuai" => "(5A) Geo Tagging tidak sesuai",
    "Tidak ada" => "(5B) Geo Tagging tidak ada",
    "Tidak terlihat jelas" => "(5C) Geo Tagging tidak terlihat jelas",
};

static PHRASES_H: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak sesuai" => "(4A) Foto sekolah tidak sesuai",
    "Tidak ada" => "(4B) Foto sekolah tidak ada",
    "Tidak terlihat jelas" => "(4E) Foto sekolah tidak terlihat jelas",
};

static PHRASES_I: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak sesuai" => "(4C) Foto Box dan PIC tidak sesuai",
    "Tidak ada" => "(4D) Foto Box dan PIC tidak ada",
};

static PHRASES_J: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak sesuai" => "(2B) Foto kelengkapan Laptop tidak sesuai",
    "Tidak ada" => "(2A) Foto kelengkapan Laptop tidak ada",
};

static PHRASES_K: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak sesuai" => "(6A) DxDiag tidak sesuai",
    "Tidak ada" => "(6B) DxDiag tidak ada",
    "Tidak terlihat jelas" => "(6C) DxDiag tidak terlihat jelas",
};

static PHRASES_O: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak sesuai" => "(1AI) Barcode SN pada BAPP tidak sesuai dengan data web DAC",
    "Tidak ada" => "(1AF) Barcode SN pada BAPP tidak ada",
    "Tidak terlihat jelas" => "(1AG) Barcode SN pada BAPP tidak terlihat jelas",
};

static PHRASES_Q: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Ceklis tidak lengkap" => "(1D) Ceklis BAPP tidak lengkap pada halaman 1",
    "Tidak Sesuai/Rusak/Tidak Ada" => "(1Q) Ceklis BAPP tidak sesuai/rusak/tidak ada pada halaman 1",
    "Tidak terlihat jelas" => "(1L) BAPP Halaman 1 tidak terlihat jelas",
    "Diedit" => "(1S) BAPP Hal 1 tidak boleh diedit digital",
    "Tidak ada" => "(1W) BAPP Hal 1 tidak ada",
    "Data tidak lengkap" => "(1N) Data BAPP halaman 1 tidak lengkap",
    "Double ceklis" => "(1I) Double ceklis pada halaman 1 BAPP",
    "Data BAPP sekolah tidak sesuai" => "(1K) Data BAPP sekolah tidak sesuai",
    "BAPP terpotong" => "(1AL) BAPP Halaman 1 terpotong",
    "Pihak pertama bukan dari tenaga pendidik" => "(1AN) Pihak pertama hanya boleh dari kepala sekolah/wakil kepala sekolah/guru/pengajar/operator sekolah",
};

static PHRASES_R: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Ceklis tidak lengkap" => "(1E) Ceklis BAPP tidak lengkap pada halaman 2",
    "Ceklis Belum Dapat Diterima" => "(1Y) Ceklis Belum Dapat Diterima",
    "Tidak terlihat jelas" => "(1M) BAPP Halaman 2 tidak terlihat jelas",
    "Diedit" => "(1T) BAPP Hal 2 tidak boleh diedit digital",
    "Tidak ada" => "(1X) BAPP Hal 2 tidak ada",
    "Tanggal tidak ada" => "(1F) Tanggal pada BAPP hal 2 tidak ada",
    "Tanggal tidak konsisten" => "(1Z) Tanggal pada BAPP hal 2 tidak konsisten",
    "Tidak ada paraf" => "(1B) Simpulan BAPP pada hal 2 belum diparaf",
    "Double ceklis" => "(1AK) Double ceklis pada halaman 2 BAPP",
    "Ceklis tidak sesuai/rusak/tidak ada" => "(1AJ) Ceklis BAPP hal 2, terdapat ceklis TIDAK SESUAI/TIDAK ADA",
    "BAPP terpotong" => "(1AM) BAPP Halaman 2 terpotong",
};

static PHRASES_S: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak konsisten" => "(1H) Data penanda tangan pada halaman 1 dan halaman 2 BAPP tidak konsisten",
    "TTD tidak ada" => "(1G) Tidak ada tanda tangan dari pihak sekolah atau pihak kedua",
    "Tidak ada nama terang pada bagian tanda tangan" => "(1AH) Tidak ada nama terang pada bagian tanda tangan",
};

static PHRASES_T: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Tidak sesuai" => "(1O) Stempel pada BAPP halaman 2 tidak sesuai dengan sekolahnya",
    "Tidak ada" => "(1P) Stempel tidak ada",
    "Tidak terlihat jelas" => "(1AD) Stempel tidak terlihat",
};

/// 某字段某取值对应的标准驳回句子；F 字段没有
pub fn error_phrase(field: FieldId, value: &str) -> Option<&'static str> {
    let table = match field {
        FieldId::G => &PHRASES_G,
        FieldId::H => &PHRASES_H,
        FieldId::I => &PHRASES_I,
        FieldId::J => &PHRASES_J,
        FieldId::K => &PHRASES_K,
        FieldId::O => &PHRASES_O,
        FieldId::Q => &PHRASES_Q,
        FieldId::R => &PHRASES_R,
        FieldId::S => &PHRASES_S,
        FieldId::T => &PHRASES_T,
        FieldId::F => return None,
    };
    table.get(value).copied()
}

/// 评估表单
#[derive(Debug, Clone, Default)]
pub struct EvaluationForm {
    options: FormOptions,
    values: BTreeMap<FieldId, String>,
    original_serial: String,
    serial_override: String,
}

impl EvaluationForm {
    pub fn new(options: FormOptions) -> Self {
        let mut form = Self {
            options,
            ..Default::default()
        };
        form.reset("");
        form
    }

    /// 替换表单选项并重置取值（保留当前任务的原始序列号）
    pub fn set_options(&mut self, options: FormOptions) {
        self.options = options;
        let original = std::mem::take(&mut self.original_serial);
        self.reset(&original);
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    /// 切换到新任务：每个字段回到第一个选项（未加载选项时用内置默认值）
    pub fn reset(&mut self, original_serial: &str) {
        self.values = FieldId::ALL
            .iter()
            .map(|&id| {
                let value = self
                    .options
                    .field(id)
                    .and_then(|f| f.default_option())
                    .unwrap_or_else(|| id.canonical_default());
                (id, value.to_string())
            })
            .collect();
        self.original_serial = original_serial.to_string();
        self.serial_override = original_serial.to_string();
    }

    pub fn value(&self, field: FieldId) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// 按数据源表单顺序列出 (字段, 取值)
    pub fn values(&self) -> Vec<(FieldId, &str)> {
        FieldId::ALL
            .iter()
            .filter_map(|&id| self.value(id).map(|v| (id, v)))
            .collect()
    }

    /// 操作员修改一个字段，随后只对该字段执行联动规则
    pub fn set(&mut self, field: FieldId, value: impl Into<String>) {
        let value = value.into();
        self.values.insert(field, value.clone());

        for rule in CASCADE_RULES
            .iter()
            .filter(|r| r.trigger == field && r.condition.matches(&value))
        {
            for effect in rule.effects {
                self.apply(*effect, &value);
            }
        }
    }

    fn apply(&mut self, effect: Effect, trigger_value: &str) {
        match effect {
            Effect::Set(target, v) => {
                debug!("联动: {} := {}", target, v);
                self.values.insert(target, v.to_string());
            }
            Effect::Mirror(target) => {
                debug!("联动: {} := {}", target, trigger_value);
                self.values.insert(target, trigger_value.to_string());
            }
            Effect::SerialOverride(SerialOverride::Dash) => {
                self.serial_override = "-".to_string();
            }
            Effect::SerialOverride(SerialOverride::Original) => {
                self.serial_override = self.original_serial.clone();
            }
        }
    }

    pub fn serial_override(&self) -> &str {
        &self.serial_override
    }

    /// 直接设置序列号覆盖值（详情到达或操作员手动输入）
    pub fn set_serial_override(&mut self, value: impl Into<String>) {
        self.serial_override = value.into();
    }

    pub fn original_serial(&self) -> &str {
        &self.original_serial
    }

    /// 已加载的每个字段都是第一个选项；未加载选项时恒为 true
    pub fn is_default(&self) -> bool {
        self.options.fields.iter().all(|field| {
            field.default_option().is_some() && self.value(field.id) == field.default_option()
        })
    }

    /// 按字段顺序拼接驳回句子，换行分隔
    pub fn reason(&self) -> String {
        self.values()
            .into_iter()
            .filter_map(|(id, v)| error_phrase(id, v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 生成提交给数据源的数据
    pub fn build_submission(&self, task: &Task, verification_date: NaiveDate) -> SubmissionPayload {
        let field = |id: FieldId| -> String {
            self.value(id)
                .unwrap_or_else(|| id.canonical_default())
                .to_string()
        };

        let sn_bapp = match self.value(FieldId::O) {
            Some("Ada") | Some("Sesuai") => task.serial_number.clone(),
            _ => self.serial_override.clone(),
        };

        SubmissionPayload {
            id_user: self.options.id_user.clone(),
            npsn: task.npsn.clone(),
            sn_penyedia: task.serial_number.clone(),
            cek_sn_penyedia: task.serial_check.clone(),
            id_update: task.action_id.clone(),
            no_bapp: task.bapp_number.clone(),
            ket_tgl_bapp: field(FieldId::F),
            tgl_bapp: verification_date.format("%Y-%m-%d").to_string(),
            sn_bapp,
            geo_tag: field(FieldId::G),
            f_papan_identitas: field(FieldId::H),
            f_box_pic: field(FieldId::I),
            f_unit: field(FieldId::J),
            spesifikasi_dxdiag: field(FieldId::K),
            bc_bapp_sn: field(FieldId::O),
            bapp_hal1: field(FieldId::Q),
            bapp_hal2: field(FieldId::R),
            nm_ttd_bapp: field(FieldId::S),
            stempel: field(FieldId::T),
        }
    }
}
