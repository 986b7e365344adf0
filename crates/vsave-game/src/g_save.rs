// g_save.rs — serialize one level into a map payload and back
//
// Payload layout:
//   names_offset (patched last), flags,
//   ASEG_MAP_HEADER level info,
//   ASEG_WORLD      object count, class per object, script count,
//                   object fields, level locals, sectors, lines,
//   ASEG_SCRIPTS    script fields,
//   ASEG_SOUNDS     sound sequences,
//   ASEG_END,
//   name table,
//   string references (offsets of interned string indices).
//
// Loading is two-phase: every object and script shell is created before
// any field is read, so references resolve regardless of order or cycles.

use vsave_common::error::{check_count, SaveError, SaveResult};
use vsave_common::savefiles::{
    SaveFlags, ASEG_END, ASEG_MAP_HEADER, ASEG_SCRIPTS, ASEG_SOUNDS, ASEG_WORLD, MAX_SAVE_OBJECTS,
    MAX_SAVE_NAMES, MAX_SAVE_SCRIPTS, MAX_SAVE_SOUNDS, MAX_SAVE_STRINGS,
};
use vsave_common::sizebuf::{SectionReader, SectionWriter};
use vsave_common::strings::{StringInterner, StringTable};

use crate::archive::{serialize_vec, Archive, Serializable};
use crate::codec::{SaveReader, SaveWriter};
use crate::g_local::Level;
use crate::name::Name;
use crate::object::{ClassRegistry, ObjectId, SkipPredicate};
use crate::script::ScriptState;

/// Sectors and lines are bounded by the map format itself.
const MAX_GEOMETRY: i32 = 1 << 20;

/// Inputs of a level save.
pub struct SaveContext<'a> {
    /// Interner for string fields; `None` writes them inline.
    pub strings: Option<&'a mut StringInterner>,
    /// Player objects by slot, referenced by position instead of saved.
    pub players: &'a [Option<ObjectId>],
    pub skip: &'a SkipPredicate,
}

/// Inputs of a level load.
pub struct LoadContext<'a> {
    /// String table of the save; required if the payload interned strings.
    pub strings: Option<&'a StringTable>,
    /// Player objects already present in the target level, by slot.
    pub players: &'a [Option<ObjectId>],
    pub registry: &'a ClassRegistry,
}

/// Serialize `level` into a self-contained map payload.
pub fn write_level(level: &mut Level, ctx: SaveContext) -> SaveResult<Vec<u8>> {
    let mut ar = SaveWriter::new(SectionWriter::new("map", true), ctx.strings, ctx.players);

    let mut flags = SaveFlags::empty();
    if ar.strings_interned() {
        flags |= SaveFlags::STRINGS_INTERNED;
    }
    ar.out().write_long(0);
    ar.out().write_long(flags.bits());

    // Register the whole graph before the first reference goes out
    for id in level.objects.ids() {
        if let Some(obj) = level.objects.get(id) {
            ar.objects.register(id, obj, ctx.skip);
        }
    }
    for id in level.scripts.ids() {
        ar.scripts.register(id);
    }

    ar.segment(ASEG_MAP_HEADER);
    level.info.serialize(&mut ar)?;

    ar.segment(ASEG_WORLD);
    let exports = ar.objects.ids().to_vec();
    ar.out().write_long(exports.len() as i32);
    for &id in &exports {
        let obj = level.objects.get(id).ok_or(SaveError::InvalidState("object vanished during save"))?;
        let mut class = Name::new(obj.class_name());
        ar.name(&mut class)?;
    }
    let num_scripts = ar.scripts.len() as i32;
    ar.out().write_long(num_scripts);
    for &id in &exports {
        let obj = level
            .objects
            .get_mut(id)
            .ok_or(SaveError::InvalidState("object vanished during save"))?;
        obj.serialize(&mut ar)?;
    }
    level.locals.serialize(&mut ar)?;
    serialize_geometry(&mut ar, "sector", &mut level.sectors)?;
    serialize_geometry(&mut ar, "line", &mut level.lines)?;

    ar.segment(ASEG_SCRIPTS);
    for id in ar.scripts.keys().to_vec() {
        if let Some(script) = level.scripts.get_mut(id) {
            script.serialize(&mut ar)?;
        }
    }

    ar.segment(ASEG_SOUNDS);
    serialize_vec(&mut ar, "sound sequence", &mut level.sounds, MAX_SAVE_SOUNDS)?;
    ar.segment(ASEG_END);

    let names_offset = ar.write_name_table();
    ar.write_string_refs();
    let mut out = ar.into_section();
    out.patch_long(0, names_offset as i32)?;
    Ok(out.data)
}

/// Rebuild a level from a map payload.
///
/// `level` must come straight from the map loader: geometry sized, players
/// spawned, nothing else. On error it is left half-filled and must be
/// discarded by the caller.
pub fn read_level(payload: Vec<u8>, level: &mut Level, ctx: LoadContext) -> SaveResult<()> {
    let mut ar = SaveReader::new(SectionReader::new("map", payload), ctx.players);
    ar.set_geometry(level.sectors.len(), level.lines.len());

    let names_offset = ar.input().read_long()?;
    let flags = SaveFlags::from_bits_truncate(ar.input().read_long()?);
    if flags.contains(SaveFlags::STRINGS_INTERNED) {
        let table = ctx
            .strings
            .ok_or_else(|| SaveError::Corrupt("map payload needs a string table the save lacks".into()))?;
        ar.set_string_table(table);
    }
    ar.read_name_table(names_offset)?;

    ar.expect_segment(ASEG_MAP_HEADER)?;
    level.info.serialize(&mut ar)?;

    ar.expect_segment(ASEG_WORLD)?;
    let num_objects = check_count("object", ar.input().read_long()?, MAX_SAVE_OBJECTS)?;
    let mut classes = Vec::with_capacity(num_objects);
    for _ in 0..num_objects {
        let mut class = Name::none();
        ar.name(&mut class)?;
        classes.push(class);
    }

    // Phase one: empty shells in table order
    for class in &classes {
        let shell = ctx.registry.create(class.as_str())?;
        ar.objects.push(level.objects.spawn(shell));
    }
    let num_scripts = check_count("script", ar.input().read_long()?, MAX_SAVE_SCRIPTS)?;
    for _ in 0..num_scripts {
        ar.scripts.push(level.scripts.start(ScriptState::default()));
    }

    // Phase two: fields
    for id in ar.objects.ids().to_vec() {
        let obj = level
            .objects
            .get_mut(id)
            .ok_or(SaveError::InvalidState("object vanished during load"))?;
        obj.serialize(&mut ar)?;
    }
    level.locals.serialize(&mut ar)?;
    serialize_geometry(&mut ar, "sector", &mut level.sectors)?;
    serialize_geometry(&mut ar, "line", &mut level.lines)?;

    ar.expect_segment(ASEG_SCRIPTS)?;
    for id in ar.scripts.entries().to_vec() {
        if let Some(script) = level.scripts.get_mut(id) {
            script.serialize(&mut ar)?;
        }
    }

    ar.expect_segment(ASEG_SOUNDS)?;
    serialize_vec(&mut ar, "sound sequence", &mut level.sounds, MAX_SAVE_SOUNDS)?;
    ar.expect_segment(ASEG_END)
}

/// Move the interned string fields of `payload` from `from`, the table it
/// was written against, onto `into`. Only strings the payload references
/// are interned. Inline payloads come back unchanged.
pub fn rebase_strings(payload: Vec<u8>, from: &StringTable, into: &mut StringInterner) -> SaveResult<Vec<u8>> {
    let mut r = SectionReader::new("map", payload);
    let names_offset = r.read_long()?;
    let flags = SaveFlags::from_bits_truncate(r.read_long()?);
    if !flags.contains(SaveFlags::STRINGS_INTERNED) {
        return Ok(r.into_data());
    }
    if names_offset < 8 || names_offset as usize > r.len() {
        return Err(SaveError::Corrupt(format!("name table offset {} out of range", names_offset)));
    }
    let body_end = names_offset as usize;

    r.seek(names_offset as usize)?;
    let num_names = check_count("name", r.read_long()?, MAX_SAVE_NAMES)?;
    for _ in 0..num_names {
        r.read_string()?;
    }
    let num_refs = check_count("string reference", r.read_long()?, MAX_SAVE_STRINGS)?;
    let mut refs = Vec::with_capacity(num_refs);
    for _ in 0..num_refs {
        let pos = r.read_long()?;
        if pos < 8 || pos as usize + 4 > body_end {
            return Err(SaveError::Corrupt(format!("string reference at {} outside the payload body", pos)));
        }
        refs.push(pos as usize);
    }

    let mut patched = Vec::with_capacity(refs.len());
    for pos in refs {
        r.seek(pos)?;
        let text = from.resolve(r.read_long()?)?;
        patched.push((pos, into.intern(text)));
    }

    let mut out = SectionWriter::new("map", true);
    out.data = r.into_data();
    for (pos, idx) in patched {
        out.patch_long(pos, idx)?;
    }
    Ok(out.data)
}

/// Fixed-size level arrays: the saved count must match the loaded map.
fn serialize_geometry<T: Serializable>(ar: &mut dyn Archive, what: &'static str, list: &mut [T]) -> SaveResult<()> {
    let count = ar.count(what, list.len(), MAX_GEOMETRY)?;
    if count != list.len() {
        return Err(SaveError::Corrupt(format!(
            "saved {} count {} does not match the map ({})",
            what,
            count,
            list.len()
        )));
    }
    for item in list.iter_mut() {
        item.serialize(ar)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_content::{content_registry, Mobj, MobjFlags, SectorMover};
    use crate::g_local::SoundSeq;
    use crate::object::skip_players;
    use crate::script::ScriptArena;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    fn save(level: &mut Level, strings: Option<&mut StringInterner>, players: &[Option<ObjectId>]) -> Vec<u8> {
        let ctx = SaveContext {
            strings,
            players,
            skip: &skip_players,
        };
        write_level(level, ctx).unwrap()
    }

    fn load(payload: Vec<u8>, strings: Option<&StringTable>, players: &[Option<ObjectId>], fresh: &mut Level) -> SaveResult<()> {
        let registry = content_registry();
        let ctx = LoadContext {
            strings,
            players,
            registry: &registry,
        };
        read_level(payload, fresh, ctx)
    }

    /// Pair saved objects with their reloaded counterparts by table order.
    fn pair_ids(old: &Level, new: &Level) -> HashMap<ObjectId, ObjectId> {
        let old_ids: Vec<ObjectId> = old.objects.iter().filter(|(_, o)| !o.is_player()).map(|(id, _)| id).collect();
        let new_ids: Vec<ObjectId> = new.objects.iter().filter(|(_, o)| !o.is_player()).map(|(id, _)| id).collect();
        assert_eq!(old_ids.len(), new_ids.len());
        old_ids.into_iter().zip(new_ids).collect()
    }

    fn sample_level() -> Level {
        let mut level = Level::new("MAP01", 4, 6);
        level.info.level_time = 35 * 60;
        level.info.total_monsters = 2;
        level.sectors[2].floor_height = 64.0;
        level.lines[5].activated = true;
        level
    }

    #[test]
    fn test_level_roundtrip() {
        let mut level = sample_level();
        let imp = level.objects.spawn(Box::new(Mobj::new("DoomImp", 60)));
        let zombie = level.objects.spawn(Box::new(Mobj::new("ZombieMan", 20)));
        level.objects.get_as_mut::<Mobj>(imp).unwrap().target = Some(zombie);
        level.objects.get_as_mut::<Mobj>(imp).unwrap().sector = Some(3);
        level.objects.get_as_mut::<Mobj>(zombie).unwrap().tag = "guard".into();
        let script = level.scripts.start(ScriptState {
            number: 12,
            pc: 40,
            locals: vec![1, 2, 3],
            activator: Some(zombie),
            line: Some(5),
            ..ScriptState::default()
        });
        let mover = level.objects.spawn(Box::new(SectorMover {
            sector: Some(2),
            speed: 2.0,
            activator: Some(imp),
            script: Some(script),
            sound_sequence: Name::new("DoorNormal"),
            ..SectorMover::default()
        }));
        level.locals.sight_entity = Some(imp);
        level.sounds.push(SoundSeq {
            sequence: Name::new("DoorNormal"),
            source: Some(mover),
            position: 3,
            volume: 1.0,
        });

        let payload = save(&mut level, None, &[]);
        let mut fresh = Level::new("MAP01", 4, 6);
        load(payload, None, &[], &mut fresh).unwrap();

        let ids = pair_ids(&level, &fresh);
        assert_eq!(fresh.info, level.info);
        assert_eq!(fresh.sectors, level.sectors);
        assert_eq!(fresh.lines, level.lines);

        let new_imp = fresh.objects.get_as::<Mobj>(ids[&imp]).unwrap();
        assert_eq!(new_imp.kind.as_str(), "DoomImp");
        assert_eq!(new_imp.target, Some(ids[&zombie]));
        assert_eq!(new_imp.sector, Some(3));
        assert_eq!(fresh.objects.get_as::<Mobj>(ids[&zombie]).unwrap().tag, "guard");

        let new_mover = fresh.objects.get_as::<SectorMover>(ids[&mover]).unwrap();
        assert_eq!(new_mover.activator, Some(ids[&imp]));
        let new_script = fresh.scripts.get(new_mover.script.unwrap()).unwrap();
        assert_eq!(new_script.locals, vec![1, 2, 3]);
        assert_eq!(new_script.activator, Some(ids[&zombie]));
        assert_eq!(new_script.line, Some(5));

        assert_eq!(fresh.locals.sight_entity, Some(ids[&imp]));
        assert_eq!(fresh.sounds[0].source, Some(ids[&mover]));
    }

    #[test]
    fn test_cycle_and_shared_reference() {
        let mut level = sample_level();
        let a = level.objects.spawn(Box::new(Mobj::new("A", 1)));
        let b = level.objects.spawn(Box::new(Mobj::new("B", 1)));
        let c = level.objects.spawn(Box::new(Mobj::new("C", 1)));
        level.objects.get_as_mut::<Mobj>(a).unwrap().target = Some(b);
        level.objects.get_as_mut::<Mobj>(b).unwrap().target = Some(c);
        level.objects.get_as_mut::<Mobj>(c).unwrap().target = Some(a);
        // a and b both point at c
        level.objects.get_as_mut::<Mobj>(a).unwrap().tracer = Some(c);
        level.objects.get_as_mut::<Mobj>(b).unwrap().tracer = Some(c);

        let payload = save(&mut level, None, &[]);
        let mut fresh = Level::new("MAP01", 4, 6);
        load(payload, None, &[], &mut fresh).unwrap();
        let ids = pair_ids(&level, &fresh);

        let get = |id| fresh.objects.get_as::<Mobj>(id).unwrap();
        let (na, nb, nc) = (ids[&a], ids[&b], ids[&c]);
        assert_eq!(get(na).target, Some(nb));
        assert_eq!(get(nb).target, Some(nc));
        assert_eq!(get(nc).target, Some(na));
        assert_eq!(get(na).tracer, get(nb).tracer);
        assert_eq!(get(na).tracer, Some(nc));
    }

    #[test]
    fn test_players_skipped_and_resolved_by_slot() {
        let mut level = sample_level();
        let pawn = level.objects.spawn(Box::new(Mobj::player()));
        let imp = level.objects.spawn(Box::new(Mobj::new("DoomImp", 60)));
        level.objects.get_as_mut::<Mobj>(imp).unwrap().target = Some(pawn);

        let payload = save(&mut level, None, &[Some(pawn)]);

        let mut fresh = Level::new("MAP01", 4, 6);
        let new_pawn = fresh.objects.spawn(Box::new(Mobj::player()));
        load(payload, None, &[Some(new_pawn)], &mut fresh).unwrap();

        // Only the pre-spawned pawn and the imp exist
        assert_eq!(fresh.objects.len(), 2);
        let ids = pair_ids(&level, &fresh);
        assert_eq!(fresh.objects.get_as::<Mobj>(ids[&imp]).unwrap().target, Some(new_pawn));
    }

    #[test]
    fn test_skipped_object_without_slot_becomes_null() {
        let mut level = sample_level();
        let pawn = level.objects.spawn(Box::new(Mobj::player()));
        let imp = level.objects.spawn(Box::new(Mobj::new("DoomImp", 60)));
        level.objects.get_as_mut::<Mobj>(imp).unwrap().target = Some(pawn);

        let payload = save(&mut level, None, &[]);
        let mut fresh = Level::new("MAP01", 4, 6);
        load(payload, None, &[], &mut fresh).unwrap();
        let ids = pair_ids(&level, &fresh);
        assert_eq!(fresh.objects.get_as::<Mobj>(ids[&imp]).unwrap().target, None);
    }

    #[test]
    fn test_interned_strings() {
        let mut level = sample_level();
        for i in 0..10 {
            let mut m = Mobj::new("Clip", 0);
            m.tag = format!("tag{}", i % 3);
            level.objects.spawn(Box::new(m));
        }
        let mut interner = StringInterner::new();
        let payload = save(&mut level, Some(&mut interner), &[]);
        assert_eq!(interner.len(), 3);

        let table = interner.into_table();
        let mut fresh = Level::new("MAP01", 4, 6);
        load(payload.clone(), Some(&table), &[], &mut fresh).unwrap();
        let tags: Vec<String> = fresh
            .objects
            .ids()
            .into_iter()
            .map(|id| fresh.objects.get_as::<Mobj>(id).unwrap().tag.clone())
            .collect();
        assert_eq!(tags[..4], ["tag0", "tag1", "tag2", "tag0"]);

        // The same payload without its table cannot be decoded
        let mut fresh = Level::new("MAP01", 4, 6);
        assert!(load(payload, None, &[], &mut fresh).unwrap_err().is_corruption());
    }

    #[test]
    fn test_reference_to_foreign_script_loads_as_none() {
        let mut level = sample_level();
        let mut elsewhere = ScriptArena::new();
        let foreign = elsewhere.start(ScriptState::default());
        let mover = level.objects.spawn(Box::new(SectorMover {
            script: Some(foreign),
            ..SectorMover::default()
        }));

        let payload = save(&mut level, None, &[]);
        let mut fresh = Level::new("MAP01", 4, 6);
        load(payload, None, &[], &mut fresh).unwrap();
        let ids = pair_ids(&level, &fresh);
        assert_eq!(fresh.objects.get_as::<SectorMover>(ids[&mover]).unwrap().script, None);
        assert!(fresh.scripts.is_empty());
    }

    #[test]
    fn test_rebase_keeps_only_referenced_strings() {
        let mut level = sample_level();
        for tag in ["left", "right", "left"] {
            let mut m = Mobj::new("Clip", 0);
            m.tag = tag.to_string();
            level.objects.spawn(Box::new(m));
        }
        // Strings from an earlier pass that this level no longer uses
        let mut stale = StringInterner::new();
        stale.intern("gone");
        stale.intern("right");
        let payload = save(&mut level, Some(&mut stale), &[]);
        assert_eq!(stale.len(), 3);

        let mut fresh_strings = StringInterner::new();
        fresh_strings.intern("other map");
        let rebased = rebase_strings(payload.clone(), stale.table(), &mut fresh_strings).unwrap();
        assert_eq!(rebased.len(), payload.len());
        assert_eq!(fresh_strings.table().entries(), ["other map", "left", "right"]);

        let table = fresh_strings.into_table();
        let mut fresh = Level::new("MAP01", 4, 6);
        load(rebased, Some(&table), &[], &mut fresh).unwrap();
        let mut tags: Vec<String> = fresh
            .objects
            .ids()
            .into_iter()
            .map(|id| fresh.objects.get_as::<Mobj>(id).unwrap().tag.clone())
            .collect();
        tags.sort();
        assert_eq!(tags, ["left", "left", "right"]);
    }

    #[test]
    fn test_rebase_inline_payload_unchanged() {
        let mut level = sample_level();
        let mut m = Mobj::new("Clip", 0);
        m.tag = "inline".into();
        level.objects.spawn(Box::new(m));
        let payload = save(&mut level, None, &[]);

        let mut strings = StringInterner::new();
        let same = rebase_strings(payload.clone(), &StringTable::new(), &mut strings).unwrap();
        assert_eq!(same, payload);
        assert!(strings.is_empty());
    }

    #[test]
    fn test_rebase_bad_index_is_corruption() {
        let mut level = sample_level();
        let mut m = Mobj::new("Clip", 0);
        m.tag = "only".into();
        level.objects.spawn(Box::new(m));
        let mut interner = StringInterner::new();
        let payload = save(&mut level, Some(&mut interner), &[]);

        // Decoding against an empty table cannot resolve index 1
        let err = rebase_strings(payload, &StringTable::new(), &mut StringInterner::new()).unwrap_err();
        assert!(matches!(err, SaveError::BadIndex { table: "string", index: 1 }));
    }

    #[test]
    fn test_unknown_class_fails() {
        let mut level = sample_level();
        level.objects.spawn(Box::new(SectorMover::default()));
        let payload = save(&mut level, None, &[]);

        let mut registry = ClassRegistry::new();
        registry.register("Actor", || Box::new(Mobj::default()));
        let mut fresh = Level::new("MAP01", 4, 6);
        let ctx = LoadContext {
            strings: None,
            players: &[],
            registry: &registry,
        };
        assert!(matches!(
            read_level(payload, &mut fresh, ctx),
            Err(SaveError::UnknownClass(ref c)) if c == "SectorMover"
        ));
    }

    #[test]
    fn test_bad_object_index_is_fatal() {
        let mut level = Level::new("MAP01", 0, 0);
        let imp = level.objects.spawn(Box::new(Mobj::new("DoomImp", 60)));
        level.locals.sight_entity = Some(imp);
        let mut payload = save(&mut level, None, &[]);

        // Tail before the name table: sight_entity, sound_target, body queue,
        // sector count, line count, ASEG_SCRIPTS, ASEG_SOUNDS, sound count,
        // ASEG_END
        let names_offset = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        let pos = names_offset - 9 * 4;
        assert_eq!(payload[pos..pos + 4], 1i32.to_le_bytes());
        payload[pos..pos + 4].copy_from_slice(&7i32.to_le_bytes());

        let mut fresh = Level::new("MAP01", 0, 0);
        let err = load(payload, None, &[], &mut fresh).unwrap_err();
        assert!(matches!(err, SaveError::BadIndex { table: "object", index: 7 }));
    }

    #[test]
    fn test_geometry_mismatch_is_corruption() {
        let mut level = sample_level();
        let payload = save(&mut level, None, &[]);
        let mut fresh = Level::new("MAP01", 5, 6);
        assert!(load(payload, None, &[], &mut fresh).unwrap_err().is_corruption());
    }

    #[test]
    fn test_truncated_payload_is_corruption() {
        let mut level = sample_level();
        level.objects.spawn(Box::new(Mobj::new("DoomImp", 60)));
        let payload = save(&mut level, None, &[]);
        for cut in [3, 12, payload.len() / 2] {
            let mut fresh = Level::new("MAP01", 4, 6);
            let err = load(payload[..cut].to_vec(), None, &[], &mut fresh).unwrap_err();
            assert!(err.is_corruption(), "cut at {}: {:?}", cut, err);
        }
    }

    #[test]
    fn test_bad_segment_marker() {
        let mut level = sample_level();
        let mut payload = save(&mut level, None, &[]);
        // The header segment tag follows names_offset and flags
        payload[8..12].copy_from_slice(&999i32.to_le_bytes());
        let mut fresh = Level::new("MAP01", 4, 6);
        assert!(matches!(
            load(payload, None, &[], &mut fresh),
            Err(SaveError::Segment { expected: ASEG_MAP_HEADER, found: 999 })
        ));
    }

    #[test]
    fn test_random_graphs_keep_their_shape() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..20 {
            let n = rng.gen_range(1..40);
            let mut level = sample_level();
            let ids: Vec<ObjectId> = (0..n)
                .map(|i| level.objects.spawn(Box::new(Mobj::new(&format!("T{}", i % 5), i))))
                .collect();
            for &id in &ids {
                let mut pick = || if rng.gen_bool(0.2) { None } else { Some(ids[rng.gen_range(0..ids.len())]) };
                let (t, r, m) = (pick(), pick(), pick());
                let mobj = level.objects.get_as_mut::<Mobj>(id).unwrap();
                mobj.target = t;
                mobj.tracer = r;
                mobj.master = m;
                mobj.flags |= MobjFlags::COUNTKILL;
            }

            let payload = save(&mut level, None, &[]);
            let mut fresh = Level::new("MAP01", 4, 6);
            load(payload, None, &[], &mut fresh).unwrap();
            let pairs = pair_ids(&level, &fresh);

            for &id in &ids {
                let old = level.objects.get_as::<Mobj>(id).unwrap();
                let new = fresh.objects.get_as::<Mobj>(pairs[&id]).unwrap();
                assert_eq!(new.target, old.target.map(|t| pairs[&t]));
                assert_eq!(new.tracer, old.tracer.map(|t| pairs[&t]));
                assert_eq!(new.master, old.master.map(|t| pairs[&t]));
                assert_eq!(new.kind, old.kind);
                assert_eq!(new.health, old.health);
                assert_eq!(new.flags, old.flags);
            }
        }
    }
}
