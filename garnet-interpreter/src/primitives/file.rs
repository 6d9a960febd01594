use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::block::Proc;
use crate::frame::Context;
use crate::invokable::Return;
use crate::primitives::{expect_string, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static CLASS_PRIMITIVES: &[Primitive] = &[
    ("read", self::read, true),
    ("readlines", self::readlines, true),
    ("write", self::write, true),
    ("exist?", self::exists, true),
    ("file?", self::is_file, true),
    ("directory?", self::is_directory, true),
    ("basename", self::basename, true),
    ("extname", self::extname, true),
];

fn path_argument(universe: &Universe, signature: &str, args: &[Value]) -> Result<String, Return> {
    match args.get(1) {
        Some(path) => expect_string(universe, signature, path),
        None => Err(universe.missing_argument(signature)),
    }
}

fn io_error(universe: &Universe, path: &str, error: std::io::Error) -> Return {
    log::debug!("file operation on {} failed: {}", path, error);
    universe.raise(&universe.core.io_error, format!("{} @ {}", error, path))
}

fn read(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.read";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    match fs::read_to_string(&path) {
        Ok(contents) => Return::Local(universe.string(contents)),
        Err(error) => io_error(universe, &path, error),
    }
}

fn readlines(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.readlines";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let lines = contents
                .split_inclusive('\n')
                .map(|line| universe.string(line))
                .collect();
            Return::Local(universe.array(lines))
        }
        Err(error) => io_error(universe, &path, error),
    }
}

fn write(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.write";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    let contents = match args.get(2) {
        Some(contents) => propagate!(crate::evaluate::stringify(universe, context, contents)),
        None => return universe.missing_argument(SIGNATURE),
    };
    match fs::write(&path, contents.as_bytes()) {
        Ok(()) => Return::Local(Value::Integer(contents.len() as i64)),
        Err(error) => io_error(universe, &path, error),
    }
}

fn exists(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.exist?";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    Return::Local(Value::Boolean(Path::new(&path).exists()))
}

fn is_file(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.file?";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    Return::Local(Value::Boolean(Path::new(&path).is_file()))
}

fn is_directory(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.directory?";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    Return::Local(Value::Boolean(Path::new(&path).is_dir()))
}

fn basename(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.basename";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    let name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match args.get(2).and_then(Value::as_string) {
        Some(suffix) if suffix == ".*" => Path::new(&name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or(name),
        Some(suffix) => name.strip_suffix(suffix.as_str()).map(str::to_string).unwrap_or(name),
        None => name,
    };
    Return::Local(universe.string(name))
}

fn extname(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "File.extname";

    let path = propagate!(path_argument(universe, SIGNATURE, &args));
    let extension = Path::new(&path)
        .extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()))
        .unwrap_or_default();
    Return::Local(universe.string(extension))
}
