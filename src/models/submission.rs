use serde::{Deserialize, Serialize};

/// 提交给数据源的评估结果，字段名与数据源表单一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub id_user: String,
    pub npsn: String,
    /// 供应商序列号
    pub sn_penyedia: String,
    pub cek_sn_penyedia: String,
    /// 数据源表单编号
    pub id_update: String,
    pub no_bapp: String,
    pub ket_tgl_bapp: String,
    /// 核验日期 `YYYY-MM-DD`
    pub tgl_bapp: String,
    /// BAPP 上的序列号
    pub sn_bapp: String,
    pub geo_tag: String,
    pub f_papan_identitas: String,
    pub f_box_pic: String,
    pub f_unit: String,
    pub spesifikasi_dxdiag: String,
    pub bc_bapp_sn: String,
    pub bapp_hal1: String,
    pub bapp_hal2: String,
    pub nm_ttd_bapp: String,
    pub stempel: String,
}
