use telebridge_record::decode;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{decode_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let record = decode(&bytes).map_err(|err| decode_error("decode failed", err))?;
    print_record(&record, args.sender.as_deref(), args.profile, format);
    Ok(SUCCESS)
}
