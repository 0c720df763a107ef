//! IPIZZA field names.

pub const VK_SERVICE: &str = "VK_SERVICE";
pub const VK_VERSION: &str = "VK_VERSION";
pub const VK_SND_ID: &str = "VK_SND_ID";
pub const VK_REC_ID: &str = "VK_REC_ID";
pub const VK_STAMP: &str = "VK_STAMP";
pub const VK_T_NO: &str = "VK_T_NO";
pub const VK_AMOUNT: &str = "VK_AMOUNT";
pub const VK_CURR: &str = "VK_CURR";
pub const VK_REC_ACC: &str = "VK_REC_ACC";
pub const VK_REC_NAME: &str = "VK_REC_NAME";
pub const VK_SND_ACC: &str = "VK_SND_ACC";
pub const VK_SND_NAME: &str = "VK_SND_NAME";
pub const VK_REF: &str = "VK_REF";
pub const VK_MSG: &str = "VK_MSG";
pub const VK_RETURN: &str = "VK_RETURN";
pub const VK_CANCEL: &str = "VK_CANCEL";
pub const VK_DATETIME: &str = "VK_DATETIME";
pub const VK_T_DATETIME: &str = "VK_T_DATETIME";

// Transported alongside the signed fields, never signed themselves.
pub const VK_MAC: &str = "VK_MAC";
pub const VK_ENCODING: &str = "VK_ENCODING";
pub const VK_LANG: &str = "VK_LANG";
pub const VK_AUTO: &str = "VK_AUTO";
