//! Outbound HTTP clients: the public CNPJ registry and the text-generation
//! service behind the document checklist.

pub mod checklist;
pub mod cnpj;

pub use checklist::{ChecklistError, ChecklistGenerator, Generated, Outcome};
pub use cnpj::{ClientPrefill, CnpjClient, CnpjError, CompanyRecord};
