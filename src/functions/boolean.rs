//! Logic functions: `boolean`, `if`, `isdefined`, and the `default()` guard
//! helper.  All of these receive unevaluated arguments.

use std::collections::HashMap;

use super::{lazy, FnContext, FunctionDefinition, FunctionValue};
use crate::error::{ErrorKind, LessError, Result};
use crate::node::Node;
use crate::value::Keyword;

pub(super) fn register(map: &mut HashMap<&'static str, FunctionDefinition>) {
    map.insert("boolean", lazy(boolean));
    map.insert("if", lazy(if_));
    map.insert("isdefined", lazy(isdefined));
    map.insert("default", lazy(default));
}

fn truthy(fctx: &mut FnContext<'_, '_>, condition: &Node) -> Result<bool> {
    Ok(condition.eval(fctx.ctx)?.is_true_keyword())
}

fn boolean(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(condition) = args.first() else {
        return Err(LessError::argument("boolean() expects a condition"));
    };
    let value = truthy(fctx, condition)?;
    Ok(FunctionValue::Node(fctx.node(Keyword::truth(value))))
}

fn if_(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(condition) = args.first() else {
        return Err(LessError::argument("if() expects a condition"));
    };

    if truthy(fctx, condition)? {
        match args.get(1) {
            Some(value) => Ok(FunctionValue::Node(value.eval(fctx.ctx)?)),
            None => Ok(FunctionValue::Nothing),
        }
    } else {
        match args.get(2) {
            Some(value) => Ok(FunctionValue::Node(value.eval(fctx.ctx)?)),
            None => Ok(FunctionValue::Nothing),
        }
    }
}

/// True when the argument evaluates without an undefined-name error.  Only
/// name errors turn into `false`; everything else still aborts.
fn isdefined(fctx: &mut FnContext<'_, '_>, args: &[Node]) -> Result<FunctionValue> {
    let Some(value) = args.first() else {
        return Err(LessError::argument("isdefined() expects a value"));
    };

    let defined = match value.eval(fctx.ctx) {
        Ok(_) => true,
        Err(e) if e.kind == ErrorKind::Name => false,
        Err(e) => return Err(e),
    };
    Ok(FunctionValue::Node(fctx.node(Keyword::truth(defined))))
}

/// Reports the value parked by the mixin-candidate filter.  Outside that
/// window the state carries an error instead, and calling `default()` is a
/// syntax error.
fn default(fctx: &mut FnContext<'_, '_>, _args: &[Node]) -> Result<FunctionValue> {
    match fctx.ctx.default_func.eval()? {
        Some(value) => Ok(FunctionValue::Node(fctx.node(Keyword::truth(value)))),
        None => Ok(FunctionValue::Passthrough),
    }
}
