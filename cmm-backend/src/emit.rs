//! Assembly text rendering
//!
//! Labels and segment directives sit at column zero; everything else is
//! indented so the output diffs cleanly against hand-written fixtures.

use cmm_codegen::AsmInst;

fn starts_line(inst: &AsmInst) -> bool {
    matches!(
        inst,
        AsmInst::Label(_)
            | AsmInst::Text
            | AsmInst::Data
            | AsmInst::Word(_, _)
            | AsmInst::FloatWord(_, _)
            | AsmInst::Space(_, _)
            | AsmInst::Asciiz(_, _)
    )
}

pub fn to_text(instructions: &[AsmInst]) -> String {
    let mut out = String::new();
    for inst in instructions {
        if !starts_line(inst) {
            out.push_str("    ");
        }
        out.push_str(&inst.to_string());
        out.push('\n');
    }
    out
}
