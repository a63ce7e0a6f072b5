//! Explicit type spec strings such as `nvarchar(100)` or `decimal(18, 2)`.

use std::fmt;

use super::descriptor::{ArgsTemplate, UNLIMITED_SIZE};

/// A parsed type spec: a name plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    /// Type name.
    pub name: String,
    /// Arguments; `max` parses as [`UNLIMITED_SIZE`].
    pub args: Vec<i32>,
}

/// Size, precision, and scale extracted from a spec's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecArgs {
    /// Size argument.
    pub size: Option<i32>,
    /// Precision argument.
    pub precision: Option<u8>,
    /// Scale argument.
    pub scale: Option<u8>,
}

impl TypeSpec {
    /// Parse `name`, `name(n)` or `name(n, m)`.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        let Some(open) = spec.find('(') else {
            if spec.is_empty() || spec.contains(')') {
                return Err(format!("invalid type spec '{spec}'"));
            }
            return Ok(Self {
                name: spec.to_string(),
                args: Vec::new(),
            });
        };

        let name = spec[..open].trim();
        let rest = &spec[open + 1..];
        let Some(inner) = rest.strip_suffix(')') else {
            return Err(format!("type spec '{spec}' is missing ')'"));
        };
        if name.is_empty() {
            return Err(format!("type spec '{spec}' has no name"));
        }

        let args = inner
            .split(',')
            .map(str::trim)
            .map(|a| {
                if a.eq_ignore_ascii_case("max") {
                    Ok(UNLIMITED_SIZE)
                } else {
                    a.parse::<i32>()
                        .map_err(|_| format!("type spec '{spec}' has invalid argument '{a}'"))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    /// Check if the type spec asks for unlimited size.
    pub fn is_unlimited(&self) -> bool {
        self.args.first() == Some(&UNLIMITED_SIZE)
    }

    /// Map arguments onto an argument template.
    pub fn apply(&self, template: ArgsTemplate) -> Result<SpecArgs, String> {
        let narrow = |v: i32| {
            u8::try_from(v).map_err(|_| format!("'{self}': {v} is out of range for precision/scale"))
        };
        let mut out = SpecArgs::default();
        match (template, self.args.as_slice()) {
            (_, []) => {}
            (ArgsTemplate::Size, [size]) => out.size = Some(*size),
            (ArgsTemplate::Precision, [p]) => out.precision = Some(narrow(*p)?),
            (ArgsTemplate::PrecisionScale, [p]) => out.precision = Some(narrow(*p)?),
            (ArgsTemplate::PrecisionScale, [p, s]) => {
                out.precision = Some(narrow(*p)?);
                out.scale = Some(narrow(*s)?);
            }
            (template, args) => {
                return Err(format!(
                    "'{self}': {} argument(s) do not fit template {template:?}",
                    args.len()
                ))
            }
        }
        Ok(out)
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self
                .args
                .iter()
                .map(|a| if *a == UNLIMITED_SIZE { "max".to_string() } else { a.to_string() })
                .collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(TypeSpec::parse("int").unwrap().args, Vec::<i32>::new());
        assert_eq!(TypeSpec::parse("varchar(50)").unwrap().args, vec![50]);

        let decimal = TypeSpec::parse(" decimal ( 18 , 2 ) ").unwrap();
        assert_eq!(decimal.name, "decimal");
        assert_eq!(decimal.args, vec![18, 2]);

        let max = TypeSpec::parse("nvarchar(MAX)").unwrap();
        assert!(max.is_unlimited());
        assert_eq!(max.to_string(), "nvarchar(max)");
    }

    #[test]
    fn test_parse_errors() {
        assert!(TypeSpec::parse("").is_err());
        assert!(TypeSpec::parse("varchar(50").is_err());
        assert!(TypeSpec::parse("(50)").is_err());
        assert!(TypeSpec::parse("varchar(x)").is_err());
    }

    #[test]
    fn test_apply() {
        let spec = TypeSpec::parse("decimal(10, 2)").unwrap();
        let args = spec.apply(ArgsTemplate::PrecisionScale).unwrap();
        assert_eq!(args.precision, Some(10));
        assert_eq!(args.scale, Some(2));

        assert!(spec.apply(ArgsTemplate::Size).is_err());
        assert!(TypeSpec::parse("decimal(300)")
            .unwrap()
            .apply(ArgsTemplate::Precision)
            .is_err());
    }
}
