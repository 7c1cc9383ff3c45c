#![no_main]

use arbitrary::Arbitrary;
use itertools::Itertools;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum Expr {
    Field(String),
    Binary(Box<Expr>, String, Box<Expr>),
    Call(String, Vec<Expr>),
    Member(Box<Expr>, String),
    Raw(String),
}

impl Expr {
    fn to_code(&self) -> String {
        match self {
            Expr::Field(name) => format!("{{{}}}", name),
            Expr::Binary(lhs, op, rhs) => format!("{} {} {}", lhs.to_code(), op, rhs.to_code()),
            Expr::Call(name, args) => {
                format!("{}({})", name, args.iter().map(Expr::to_code).join(", "))
            }
            Expr::Member(target, name) => format!("{}.{}", target.to_code(), name),
            Expr::Raw(code) => code.clone(),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Input {
    raw: Option<String>,
    generated: Option<Expr>,
    filter_mode: bool,
}

/// Answers every lookup with the subject record itself.
struct EchoLookup(std::sync::Arc<fexpr_lang::Record>);

impl fexpr_lang::FeatureLookup for EchoLookup {
    fn get_feature(
        &mut self,
        _: &str,
        _: &str,
        _: &fexpr_lang::Value,
    ) -> Option<std::sync::Arc<fexpr_lang::Record>> {
        Some(std::sync::Arc::clone(&self.0))
    }
}

fuzz_target!(|input: Input| {
    let code = match (&input.raw, &input.generated) {
        (Some(raw), _) => raw.clone(),
        (_, Some(generated)) => generated.to_code(),
        _ => "".to_string(),
    };

    let record = fexpr_lang::Record::new().with("a", 1).with("b", "text");
    let mut lookup = EchoLookup(std::sync::Arc::new(record.clone()));
    let mut ctx = fexpr_lang::Context::new(&record, &mut lookup).with_filter_mode(input.filter_mode);
    let _ = fexpr_lang::eval(&code, &mut ctx);
});
