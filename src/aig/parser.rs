use std::{fs::File, io::BufReader, path::Path};

use crate::{Aig, AigEdge, AigError, Result, aig::error::ParserError};

fn read_u64(s: &str) -> std::result::Result<u64, ParserError> {
    s.parse::<u64>()
        .map_err(|_| ParserError::InvalidToken(s.to_string() + " expected u64"))
}

fn check_even(x: u64) -> Result<()> {
    if x & 1 == 1 {
        return Err(ParserError::InvalidToken(
            "expected literal to be even, got ".to_string() + &x.to_string(),
        )
        .into());
    }
    Ok(())
}

fn read_line(reader: &mut impl std::io::BufRead, line: &mut String) -> Result<()> {
    line.clear();
    let n = reader
        .read_line(line)
        .map_err(|e| ParserError::IoError(e.to_string()))?;
    if n == 0 {
        return Err(ParserError::InvalidToken("unexpected end of file".to_string()).into());
    }
    Ok(())
}

fn read_init(token: &str, latch_lit: u64) -> std::result::Result<Option<bool>, ParserError> {
    let res = read_u64(token)?;
    if res == 0 {
        Ok(Some(false))
    } else if res == 1 {
        Ok(Some(true))
    } else if res == latch_lit {
        Ok(None)
    } else {
        Err(ParserError::InvalidToken(
            "expected 0 1 or latch literal for latch initialization, got ".to_string() + token,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    m: u64,
    i: u64,
    l: u64,
    o: u64,
    a: u64,
}

impl TryFrom<&String> for Header {
    type Error = ParserError;

    fn try_from(line: &String) -> std::result::Result<Self, Self::Error> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.len() < 6 {
            return Err(ParserError::InvalidToken(
                "missing header tokens".to_string(),
            ));
        }

        if tokens[0] != "aag" && tokens[0] != "aig" {
            return Err(ParserError::InvalidToken(
                "expected aag (or at least aig)".to_string(),
            ));
        }

        let m = read_u64(tokens[1])?;
        let i = read_u64(tokens[2])?;
        let l = read_u64(tokens[3])?;
        let o = read_u64(tokens[4])?;
        let a = read_u64(tokens[5])?;

        if tokens.len() > 6 {
            return Err(ParserError::UnsupportedFeature(
                "header only supports M I L O A".to_string(),
            ));
        }

        if i + l + a > m {
            return Err(ParserError::InvalidToken(format!(
                "maximum variable index {} is smaller than I + L + A = {}",
                m,
                i + l + a
            )));
        }

        Ok(Header { m, i, l, o, a })
    }
}

/// The AIGER netlist as read from the file, in terms of AIGER literals.
#[derive(Debug, Default)]
struct Netlist {
    inputs: Vec<u64>,
    /// (variable, next literal, init)
    latches: Vec<(u64, u64, Option<bool>)>,
    outputs: Vec<u64>,
    /// (variable, fanin literal, fanin literal)
    ands: Vec<(u64, u64, u64)>,
}

const UNSEEN: u8 = 0;
const EXPANDED: u8 = 1;

/// Builder shared by both formats.
///
/// And gates of the ASCII format may come in any order, they are created on demand
/// so that the arena stays topologically ordered.
fn build_aig(header: Header, netlist: Netlist) -> Result<Aig> {
    let n_vars = header.m as usize + 1;
    let mut aig = Aig::new();
    let mut map: Vec<Option<AigEdge>> = vec![None; n_vars];
    let mut defs: Vec<Option<(u64, u64)>> = vec![None; n_vars];
    map[0] = Some(!aig.get_const_true());

    let check_var = |var: u64| -> Result<usize> {
        if var == 0 || var as usize >= n_vars {
            return Err(AigError::NodeDoesNotExist(var as usize));
        }
        Ok(var as usize)
    };
    let define = |map: &[Option<AigEdge>], defs: &[Option<(u64, u64)>], var: usize| {
        if map[var].is_some() || defs[var].is_some() {
            return Err(AigError::from(ParserError::InvalidToken(format!(
                "variable {} defined twice",
                var
            ))));
        }
        Ok(())
    };

    for &lit in &netlist.inputs {
        let var = check_var(lit >> 1)?;
        define(&map, &defs, var)?;
        map[var] = Some(aig.add_input());
    }
    for &(lit, _, init) in &netlist.latches {
        let var = check_var(lit >> 1)?;
        define(&map, &defs, var)?;
        map[var] = Some(aig.add_latch(init));
    }
    for &(lit, rhs0, rhs1) in &netlist.ands {
        let var = check_var(lit >> 1)?;
        define(&map, &defs, var)?;
        defs[var] = Some((rhs0, rhs1));
    }

    let mut state = vec![UNSEEN; n_vars];
    let mut resolve = |aig: &mut Aig, lit: u64| -> Result<AigEdge> {
        let root = lit >> 1;
        if root as usize >= n_vars {
            return Err(AigError::NodeDoesNotExist(root as usize));
        }
        let mut stack = vec![root as usize];
        while let Some(&var) = stack.last() {
            if map[var].is_some() {
                stack.pop();
                continue;
            }
            let (rhs0, rhs1) = defs[var].ok_or(AigError::NodeDoesNotExist(var))?;
            let (v0, v1) = ((rhs0 >> 1) as usize, (rhs1 >> 1) as usize);
            for v in [v0, v1] {
                if v >= n_vars {
                    return Err(AigError::NodeDoesNotExist(v));
                }
            }
            match (map[v0], map[v1]) {
                (Some(e0), Some(e1)) => {
                    let e = aig.try_and(e0.not_if(rhs0 & 1 != 0), e1.not_if(rhs1 & 1 != 0))?;
                    map[var] = Some(e);
                    stack.pop();
                }
                _ => {
                    if state[var] == EXPANDED {
                        return Err(AigError::InvalidState(format!(
                            "combinational cycle through variable {}",
                            var
                        )));
                    }
                    state[var] = EXPANDED;
                    stack.extend([v0, v1].into_iter().filter(|&v| map[v].is_none()));
                }
            }
        }
        let edge = map[root as usize].ok_or(AigError::NodeDoesNotExist(root as usize))?;
        Ok(edge.not_if(lit & 1 != 0))
    };

    for (k, &(_, next, _)) in netlist.latches.iter().enumerate() {
        let edge = resolve(&mut aig, next)?;
        aig.set_latch_next(k, edge)?;
    }
    for &lit in &netlist.outputs {
        let edge = resolve(&mut aig, lit)?;
        aig.add_output(edge);
    }
    // Dangling gates are kept, as in the file
    for &(lit, _, _) in &netlist.ands {
        resolve(&mut aig, lit)?;
    }

    aig.check_integrity()?;
    Ok(aig)
}

/// Parser for the ASCII AIGER format.
mod ascii {
    use crate::{
        Aig, Result,
        aig::error::ParserError,
        aig::parser::{Header, Netlist, build_aig, check_even, read_init, read_line, read_u64},
    };
    use std::io::{BufReader, Read};

    pub(super) fn read_input(line: &str) -> Result<u64> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.is_empty() {
            return Err(
                ParserError::InvalidToken("expected input token, got nothing".to_string()).into(),
            );
        }

        if tokens.len() > 1 {
            return Err(ParserError::InvalidToken(
                "expected nothing after input, got ".to_string() + tokens[1],
            )
            .into());
        }

        let i = read_u64(tokens[0])?;
        check_even(i)?;
        Ok(i)
    }

    fn read_latch(line: &str) -> Result<(u64, u64, Option<bool>)> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.len() < 2 {
            return Err(ParserError::InvalidToken("not enough latch tokens".to_string()).into());
        }

        if tokens.len() > 3 {
            return Err(ParserError::InvalidToken(
                "expected nothing after latch, got ".to_string() + tokens[3],
            )
            .into());
        }

        let lit = read_u64(tokens[0])?;
        let next = read_u64(tokens[1])?;
        let init = if tokens.len() > 2 {
            read_init(tokens[2], lit)?
        } else {
            Some(false)
        };
        check_even(lit)?;
        Ok((lit, next, init))
    }

    pub(super) fn read_output(line: &str) -> Result<u64> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.is_empty() {
            return Err(ParserError::InvalidToken(
                "expected output token, got nothing".to_string(),
            )
            .into());
        }

        if tokens.len() > 1 {
            return Err(ParserError::InvalidToken(
                "expected nothing after output, got ".to_string() + tokens[1],
            )
            .into());
        }

        Ok(read_u64(tokens[0])?)
    }

    fn read_and(line: &str) -> Result<(u64, u64, u64)> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.len() < 3 {
            return Err(ParserError::InvalidToken("not enough and tokens".to_string()).into());
        }

        if tokens.len() > 3 {
            return Err(ParserError::InvalidToken(
                "expected nothing after and tokens, got ".to_string() + tokens[3],
            )
            .into());
        }

        let lhs = read_u64(tokens[0])?;
        let rhs0 = read_u64(tokens[1])?;
        let rhs1 = read_u64(tokens[2])?;
        check_even(lhs)?;
        Ok((lhs, rhs0, rhs1))
    }

    fn read_lines<T>(
        n: u64,
        reader: &mut BufReader<impl Read>,
        parse: impl Fn(&str) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut line = String::new();
        for _ in 0..n {
            read_line(reader, &mut line)?;
            items.push(parse(&line)?);
        }
        Ok(items)
    }

    impl Aig {
        /// Creates an AIG from an open .aag file using ASCII format.
        ///
        /// Use this function if the file is already open with the reader.
        /// Symbols and comments are ignored.
        pub fn from_ascii(mut reader: BufReader<impl Read>) -> Result<Self> {
            let mut line: String = String::new();

            read_line(&mut reader, &mut line)?;
            let header: Header = Header::try_from(&line)?;

            let netlist = Netlist {
                inputs: read_lines(header.i, &mut reader, read_input)?,
                latches: read_lines(header.l, &mut reader, read_latch)?,
                outputs: read_lines(header.o, &mut reader, read_output)?,
                ands: read_lines(header.a, &mut reader, read_and)?,
            };

            build_aig(header, netlist)
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;
        use test_log::test;

        #[test]
        fn read_input_test() {
            assert!(read_input("").is_err());
            assert!(read_input(" ").is_err());
            assert!(read_input("-5").is_err());
            assert!(read_input("2 14").is_err());
            assert!(read_input("4 z").is_err());
            assert!(read_input("3").is_err());

            assert_eq!(read_input(" 2").unwrap(), 2);
            assert_eq!(read_input("2 ").unwrap(), 2);
            assert_eq!(read_input("   42  ").unwrap(), 42);
        }

        #[test]
        fn read_output_test() {
            assert!(read_output("").is_err());
            assert!(read_output(" ").is_err());
            assert!(read_output("-5").is_err());
            assert!(read_output("2 14").is_err());

            assert_eq!(read_output(" 2").unwrap(), 2);
            assert_eq!(read_output("3 ").unwrap(), 3);
            assert_eq!(read_output("0").unwrap(), 0);
        }

        #[test]
        fn read_and_test() {
            assert!(read_and("").is_err());
            assert!(read_and("2 14").is_err());
            assert!(read_and("4 18 2 2").is_err());
            assert!(read_and("3 2 1").is_err());

            assert_eq!(read_and("2 6 7").unwrap(), (2, 6, 7));
            assert_eq!(read_and("   42   5 19   ").unwrap(), (42, 5, 19));
        }

        #[test]
        fn read_latch_test() {
            assert!(read_latch("").is_err());
            assert!(read_latch("-5").is_err());
            assert!(read_latch("3 14").is_err());
            assert!(read_latch("4 18 2").is_err());

            assert_eq!(read_latch("2 6").unwrap(), (2, 6, Some(false)));
            assert_eq!(read_latch("6 1 1").unwrap(), (6, 1, Some(true)));
            assert_eq!(read_latch("6 1 0").unwrap(), (6, 1, Some(false)));
            assert_eq!(read_latch("6 1 6").unwrap(), (6, 1, None));
        }

        #[test]
        fn from_ascii_test() {
            // Toggle flip-flop with enable, and gates out of order
            let text = "aag 5 1 1 1 3\n2\n4 11\n4\n10 9 7\n6 2 5\n8 3 4\n";
            let aig = Aig::from_ascii(BufReader::new(text.as_bytes())).unwrap();
            assert_eq!(aig.n_inputs(), 1);
            assert_eq!(aig.n_latches(), 1);
            assert_eq!(aig.n_outputs(), 1);
            assert_eq!(aig.n_ands(), 3);
            assert_eq!(aig.get_latch_init(0), Some(false));

            let frames = aig.simulate(&[false], &[vec![true], vec![false], vec![true]]);
            let latch = aig.get_latches()[0];
            let values: Vec<bool> = frames.iter().map(|v| v[latch]).collect();
            assert_eq!(values, vec![false, true, true]);
        }

        #[test]
        fn from_ascii_errors_test() {
            // Cycle
            let text = "aag 3 1 0 1 2\n2\n6\n4 2 6\n6 2 4\n";
            assert!(Aig::from_ascii(BufReader::new(text.as_bytes())).is_err());
            // Undefined variable
            let text = "aag 3 1 0 1 1\n2\n4\n4 2 6\n";
            assert!(Aig::from_ascii(BufReader::new(text.as_bytes())).is_err());
            // Truncated
            let text = "aag 2 1 0 1 1\n2\n";
            assert!(Aig::from_ascii(BufReader::new(text.as_bytes())).is_err());
        }
    }
}

/// Parser for the bin AIGER format.
mod bin {
    use std::io::{BufReader, Read};

    use crate::{
        Aig, Result,
        aig::error::ParserError,
        aig::parser::{Header, Netlist, ascii, build_aig, read_init, read_line, read_u64},
    };

    fn read_latch(lit: u64, line: &str) -> Result<(u64, u64, Option<bool>)> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.is_empty() {
            return Err(ParserError::InvalidToken("not enough latch tokens".to_string()).into());
        }

        if tokens.len() > 2 {
            return Err(ParserError::InvalidToken(
                "expected nothing after latch, got ".to_string() + tokens[2],
            )
            .into());
        }

        let next = read_u64(tokens[0])?;
        let init = if tokens.len() > 1 {
            read_init(tokens[1], lit)?
        } else {
            Some(false)
        };
        Ok((lit, next, init))
    }

    fn getnoneofch(buf: &[u8], offset: &mut usize) -> Result<u8> {
        if *offset >= buf.len() {
            return Err(ParserError::InvalidToken("unexpected end of file".to_string()).into());
        }

        let byte = buf[*offset];
        *offset += 1;
        Ok(byte)
    }

    fn decode_delta(buf: &[u8], offset: &mut usize) -> Result<u64> {
        let mut x = 0;
        let mut i = 0;

        loop {
            let ch = getnoneofch(buf, offset)?;
            if i >= 10 {
                return Err(ParserError::InvalidToken("delta does not fit in u64".to_string()).into());
            }
            x |= ((ch & 0x7f) as u64) << (7 * i);
            i += 1;

            if ch & 0x80 == 0 {
                break;
            }
        }
        Ok(x)
    }

    fn read_ands(reader: &mut BufReader<impl Read>, header: Header) -> Result<Vec<(u64, u64, u64)>> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| ParserError::IoError(e.to_string()))?;

        let mut offset = 0;
        let mut lhs = 2 * (header.i + header.l + 1);
        let mut ands = Vec::with_capacity(header.a as usize);

        for _ in 0..header.a {
            let delta0 = decode_delta(&buf, &mut offset)?;
            let delta1 = decode_delta(&buf, &mut offset)?;

            let rhs0 = lhs.checked_sub(delta0);
            let rhs1 = rhs0.and_then(|r| r.checked_sub(delta1));
            let (Some(rhs0), Some(rhs1)) = (rhs0, rhs1) else {
                return Err(ParserError::InvalidToken(format!(
                    "invalid delta encoding for and gate {}",
                    lhs
                ))
                .into());
            };
            ands.push((lhs, rhs0, rhs1));

            lhs += 2;
        }

        Ok(ands)
    }

    impl Aig {
        /// Creates an AIG from an open .aig file using the binary format.
        pub fn from_bin(mut reader: BufReader<impl Read>) -> Result<Self> {
            let mut line: String = String::new();

            read_line(&mut reader, &mut line)?;
            let header: Header = Header::try_from(&line)?;

            // Inputs and latches are implicit in the binary format
            let inputs = (1..=header.i).map(|v| 2 * v).collect();
            let mut latches = Vec::new();
            for k in 0..header.l {
                read_line(&mut reader, &mut line)?;
                latches.push(read_latch(2 * (header.i + k + 1), &line)?);
            }
            let mut outputs = Vec::new();
            for _ in 0..header.o {
                read_line(&mut reader, &mut line)?;
                outputs.push(ascii::read_output(&line)?);
            }
            let ands = read_ands(&mut reader, header)?;

            build_aig(
                header,
                Netlist {
                    inputs,
                    latches,
                    outputs,
                    ands,
                },
            )
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;
        use test_log::test;

        #[test]
        fn decode_delta_test() {
            let mut offset = 0;
            assert_eq!(decode_delta(&[0x02], &mut offset).unwrap(), 2);
            let mut offset = 0;
            assert_eq!(decode_delta(&[0x81, 0x01], &mut offset).unwrap(), 129);
            assert_eq!(offset, 2);
            let mut offset = 0;
            assert!(decode_delta(&[0x81], &mut offset).is_err());
        }

        #[test]
        fn from_bin_test() {
            // and of two inputs: lhs 6, rhs 4 and 2 so deltas 2 and 2
            let mut bytes = b"aig 3 2 0 1 1\n6\n".to_vec();
            bytes.extend([0x02, 0x02]);
            let aig = Aig::from_bin(BufReader::new(bytes.as_slice())).unwrap();
            assert_eq!(aig.n_inputs(), 2);
            assert_eq!(aig.n_ands(), 1);
            let o = aig.get_outputs()[0];
            assert!(aig.simulate_comb(&[true, true])[o]);
            assert!(!aig.simulate_comb(&[true, false])[o]);
        }
    }
}

impl Aig {
    /// Creates an AIG from an .aig (resp .aag) file using bin (resp. ASCII) AIGER format.
    ///
    /// Only the M I L O A header is supported: no bad state, constraint, justice or fairness sections.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref()).map_err(|z| ParserError::IoError(z.to_string()))?;
        let reader = BufReader::new(f);
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("aag") => Aig::from_ascii(reader),
            Some("aig") => Aig::from_bin(reader),
            _ => Err(
                ParserError::IoError("invalid extension, expected .aag or .aig".to_string()).into(),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn read_u64_test() {
        assert!(read_u64("").is_err());
        assert!(read_u64(" ").is_err());
        assert!(read_u64(" 2").is_err());
        assert!(read_u64("2 ").is_err());
        assert!(read_u64("-5").is_err());

        assert_eq!(read_u64("42").unwrap(), 42);
        assert_eq!(read_u64("0").unwrap(), 0);
    }

    #[test]
    fn header_try_from_test() {
        assert!(Header::try_from(&"".to_string()).is_err());
        assert!(Header::try_from(&"aag 0 0 0 0".to_string()).is_err());

        let h_empty = Header {
            m: 0,
            i: 0,
            l: 0,
            o: 0,
            a: 0,
        };

        assert_eq!(
            Header::try_from(&"   aag 0 0 0 0 0 ".to_string()).unwrap(),
            h_empty
        );

        // In theory, this shouldn't work but a lot of people do not care about aig vs aag
        assert_eq!(
            Header::try_from(&"aig 0 0 0 0 0".to_string()).unwrap(),
            h_empty
        );

        assert_eq!(
            Header::try_from(&"aag 21 18 2 0 1     ".to_string()).unwrap(),
            Header {
                m: 21,
                i: 18,
                l: 2,
                o: 0,
                a: 1
            }
        );

        assert!(Header::try_from(&"aag 1 1 -1 1 1".to_string()).is_err());
        assert!(Header::try_from(&"aag 1 18 2 0 1".to_string()).is_err());
    }

    #[test]
    fn from_file_extension_test() {
        assert!(Aig::from_file("does_not_exist.txt").is_err());
    }
}
